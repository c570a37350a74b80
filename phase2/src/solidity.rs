//! Export of a BN254 verifying key as a Solidity Groth16 verifier.

use ark_bn254::{Bn254, Fq, Fr, G1Affine, G2Affine};
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::VerifyingKey;
use num_bigint::BigUint;
use std::fmt::Write;

/// Default file name of the exported contract.
pub const VERIFIER_FILE_NAME: &str = "Groth16Verifier.sol";

fn decimal(element: &Fq) -> String {
    BigUint::from_bytes_be(&element.into_bigint().to_bytes_be()).to_string()
}

fn modulus<F: PrimeField>() -> String {
    BigUint::from_bytes_be(&F::MODULUS.to_bytes_be()).to_string()
}

fn g1_constants(out: &mut String, name: &str, point: &G1Affine) -> std::fmt::Result {
    let (x, y) = match point.infinity {
        true => ("0".to_string(), "0".to_string()),
        false => (decimal(&point.x), decimal(&point.y)),
    };
    writeln!(out, "    uint256 constant {}_X = {};", name, x)?;
    writeln!(out, "    uint256 constant {}_Y = {};", name, y)
}

/// G2 coordinates are laid out with the imaginary part first, as the pairing precompile expects.
fn g2_constants(out: &mut String, name: &str, point: &G2Affine) -> std::fmt::Result {
    let coordinates = match point.infinity {
        true => vec!["0".to_string(); 4],
        false => vec![
            decimal(&point.x.c1),
            decimal(&point.x.c0),
            decimal(&point.y.c1),
            decimal(&point.y.c0),
        ],
    };
    for (suffix, value) in ["X1", "X0", "Y1", "Y0"].iter().zip(coordinates) {
        writeln!(out, "    uint256 constant {}_{} = {};", name, suffix, value)?;
    }
    Ok(())
}

/// Renders a verifier contract for the given verifying key. The contract exposes
/// `verifyProof(a, b, c, input)` and checks the proof with the EVM precompiles
/// for point addition (0x06), scalar multiplication (0x07) and pairing (0x08).
pub fn export_verifier(vk: &VerifyingKey<Bn254>) -> Result<String, std::fmt::Error> {
    let num_inputs = vk.gamma_abc_g1.len().saturating_sub(1);
    let mut out = String::new();

    writeln!(out, "// SPDX-License-Identifier: MIT")?;
    writeln!(out, "pragma solidity ^0.8.20;")?;
    writeln!(out)?;
    writeln!(out, "contract Groth16Verifier {{")?;
    writeln!(out, "    uint256 constant PRIME_Q = {};", modulus::<Fq>())?;
    writeln!(out, "    uint256 constant SNARK_SCALAR_FIELD = {};", modulus::<Fr>())?;
    writeln!(out)?;
    g1_constants(&mut out, "ALPHA", &vk.alpha_g1)?;
    g2_constants(&mut out, "BETA", &vk.beta_g2)?;
    g2_constants(&mut out, "GAMMA", &vk.gamma_g2)?;
    g2_constants(&mut out, "DELTA", &vk.delta_g2)?;
    for (i, point) in vk.gamma_abc_g1.iter().enumerate() {
        g1_constants(&mut out, &format!("IC{}", i), point)?;
    }
    writeln!(out)?;

    match num_inputs {
        0 => writeln!(
            out,
            "    function verifyProof(uint256[2] calldata a, uint256[2][2] calldata b, uint256[2] calldata c) public view returns (bool) {{"
        )?,
        n => writeln!(
            out,
            "    function verifyProof(uint256[2] calldata a, uint256[2][2] calldata b, uint256[2] calldata c, uint256[{}] calldata input) public view returns (bool) {{",
            n
        )?,
    }
    writeln!(out, "        uint256[2] memory vkX = [IC0_X, IC0_Y];")?;
    for i in 0..num_inputs {
        writeln!(out, "        require(input[{}] < SNARK_SCALAR_FIELD, \"input out of range\");", i)?;
        writeln!(
            out,
            "        vkX = ecAdd(vkX, ecMul([IC{}_X, IC{}_Y], input[{}]));",
            i + 1,
            i + 1,
            i
        )?;
    }
    writeln!(out)?;
    writeln!(out, "        uint256[24] memory pairingInput = [")?;
    writeln!(out, "            a[0], (PRIME_Q - (a[1] % PRIME_Q)) % PRIME_Q,")?;
    writeln!(out, "            b[0][0], b[0][1], b[1][0], b[1][1],")?;
    writeln!(out, "            ALPHA_X, ALPHA_Y, BETA_X1, BETA_X0, BETA_Y1, BETA_Y0,")?;
    writeln!(out, "            vkX[0], vkX[1], GAMMA_X1, GAMMA_X0, GAMMA_Y1, GAMMA_Y0,")?;
    writeln!(out, "            c[0], c[1], DELTA_X1, DELTA_X0, DELTA_Y1, DELTA_Y0")?;
    writeln!(out, "        ];")?;
    writeln!(out, "        return pairing(pairingInput);")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    out.push_str(HELPERS);
    writeln!(out, "}}")?;

    Ok(out)
}

const HELPERS: &str = r#"    function ecAdd(uint256[2] memory p, uint256[2] memory q) internal view returns (uint256[2] memory r) {
        uint256[4] memory input = [p[0], p[1], q[0], q[1]];
        bool success;
        assembly {
            success := staticcall(gas(), 0x06, input, 0x80, r, 0x40)
        }
        require(success, "ecAdd failed");
    }

    function ecMul(uint256[2] memory p, uint256 s) internal view returns (uint256[2] memory r) {
        uint256[3] memory input = [p[0], p[1], s];
        bool success;
        assembly {
            success := staticcall(gas(), 0x07, input, 0x60, r, 0x40)
        }
        require(success, "ecMul failed");
    }

    function pairing(uint256[24] memory input) internal view returns (bool) {
        uint256[1] memory out;
        bool success;
        assembly {
            success := staticcall(gas(), 0x08, input, 0x300, out, 0x20)
        }
        require(success, "pairing failed");
        return out[0] == 1;
    }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::{AffineRepr, CurveGroup};

    fn verifying_key(inputs: usize) -> VerifyingKey<Bn254> {
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        VerifyingKey {
            alpha_g1: g1,
            beta_g2: g2,
            gamma_g2: g2,
            delta_g2: (g2 + g2).into_affine(),
            gamma_abc_g1: vec![g1; inputs + 1],
        }
    }

    #[test]
    fn test_export_verifier() {
        let contract = export_verifier(&verifying_key(1)).unwrap();
        assert!(contract.contains("pragma solidity ^0.8.20;"));
        assert!(contract.contains("contract Groth16Verifier"));
        // the generator of G1 is (1, 2)
        assert!(contract.contains("uint256 constant ALPHA_X = 1;"));
        assert!(contract.contains("uint256 constant ALPHA_Y = 2;"));
        assert!(contract.contains("uint256 constant IC1_X = 1;"));
        assert!(!contract.contains("IC2_X"));
        assert!(contract.contains("uint256[1] calldata input"));
        assert!(contract.contains(
            "uint256 constant PRIME_Q = 21888242871839275222246405745257275088696311157297823662689037894645226208583;"
        ));
        assert!(contract.contains(&format!(
            "uint256 constant BETA_X1 = {};",
            decimal(&G2Affine::generator().x.c1)
        )));
    }

    #[test]
    fn test_export_verifier_without_inputs() {
        let contract = export_verifier(&verifying_key(0)).unwrap();
        assert!(!contract.contains("calldata input"));
        assert!(contract.contains("uint256[2] memory vkX = [IC0_X, IC0_Y];"));
    }
}
