mod ceremony;
pub use ceremony::{contribute, initialize, presigned, upload, verify};

mod keys;
pub use keys::{export_verifier, extract_keys, PROVING_KEY_FILE, VERIFIER_CONTRACT_FILE, VERIFYING_KEY_FILE};

mod transcript;
pub use transcript::{import_ptau, new_transcript, MAX_DEVELOPMENT_POWER};

use gumdrop::Options;

#[derive(Debug, Options, Clone)]
pub struct Phase2Opts {
    help: bool,
    #[options(command)]
    pub command: Option<Command>,
}

// The supported commands
#[derive(Debug, Options, Clone)]
pub enum Command {
    #[options(help = "import a snarkjs .ptau transcript into the phase 1 format")]
    P1i(ImportOpts),
    #[options(help = "create a development phase 1 transcript with one random contribution")]
    P1n(NewTranscriptOpts),
    #[options(help = "initialize phase 2 for a circuit in the working directory")]
    P2n(InitializeOpts),
    #[options(help = "upload the initial phase 2 artifacts to a bucket")]
    P2u(UploadOpts),
    #[options(help = "contribute to phase 2 through a presigned upload URL")]
    P2c(ContributeOpts),
    #[options(help = "verify a phase 2 contribution against its predecessor")]
    P2v(VerifyOpts),
    #[options(help = "generate presigned URLs for uploading contributions")]
    Presigned(PresignedOpts),
    #[options(help = "extract the proving and verifying keys")]
    Key(KeyOpts),
    #[options(help = "export a Solidity verifier contract from a verifying key")]
    Sol(SolOpts),
}

#[derive(Debug, Options, Clone)]
pub struct ImportOpts {
    help: bool,
    #[options(free, required, help = "the snarkjs .ptau file to import")]
    pub ptau: String,
    #[options(free, required, help = "the phase 1 file to write")]
    pub output: String,
}

#[derive(Debug, Options, Clone)]
pub struct NewTranscriptOpts {
    help: bool,
    #[options(free, required, help = "the transcript has 2^power powers of tau")]
    pub power: usize,
    #[options(free, required, help = "the phase 1 file to write")]
    pub output: String,
}

#[derive(Debug, Options, Clone)]
pub struct InitializeOpts {
    help: bool,
    #[options(free, required, help = "the phase 1 transcript")]
    pub phase1: String,
    #[options(free, required, help = "the circuit description")]
    pub circuit: String,
    #[options(no_short, help = "drand round of the phase 1 beacon (env DRAND_PHASE1_ROUND)")]
    pub beacon_round: Option<u64>,
    #[options(no_short, help = "drand round of the phase 2 beacon, if already announced (env DRAND_PHASE2_ROUND)")]
    pub phase2_beacon_round: Option<u64>,
}

#[derive(Debug, Options, Clone)]
pub struct UploadOpts {
    help: bool,
    #[options(free, required, help = "the bucket to upload to")]
    pub bucket: String,
}

#[derive(Debug, Options, Clone)]
pub struct ContributeOpts {
    help: bool,
    #[options(free, required, help = "the presigned URL to upload the contribution to")]
    pub url: String,
    #[options(free, required, help = "the bucket holding the previous contribution")]
    pub bucket: String,
}

#[derive(Debug, Options, Clone)]
pub struct VerifyOpts {
    help: bool,
    #[options(free, required, help = "the index of the contribution to verify")]
    pub index: u64,
    #[options(free, required, help = "the bucket holding the contributions")]
    pub bucket: String,
}

#[derive(Debug, Options, Clone)]
pub struct PresignedOpts {
    help: bool,
    #[options(free, required, help = "the bucket to upload contributions to")]
    pub bucket: String,
    #[options(free, required, help = "the number of contributions")]
    pub count: u64,
}

#[derive(Debug, Options, Clone)]
pub struct KeyOpts {
    help: bool,
    #[options(free, required, help = "the phase 1 transcript")]
    pub phase1: String,
    #[options(free, required, help = "the last verified phase 2 contribution")]
    pub phase2: String,
    #[options(free, required, help = "the phase 2 evaluations")]
    pub evals: String,
    #[options(free, required, help = "the circuit description")]
    pub circuit: String,
    #[options(no_short, help = "drand round of the phase 1 beacon (env DRAND_PHASE1_ROUND)")]
    pub phase1_beacon_round: Option<u64>,
    #[options(no_short, help = "drand round of the phase 2 beacon (env DRAND_PHASE2_ROUND)")]
    pub phase2_beacon_round: Option<u64>,
    #[options(no_short, help = "the directory to write pk and vk to", default = ".")]
    pub output: String,
}

#[derive(Debug, Options, Clone)]
pub struct SolOpts {
    help: bool,
    #[options(free, required, help = "the verifying key")]
    pub vk: String,
    #[options(no_short, help = "the directory to write the contract to", default = ".")]
    pub output: String,
}
