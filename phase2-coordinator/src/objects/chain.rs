use crate::{objects::Contribution, CoordinatorError};

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use tracing::{debug, trace};

/// The progress of a ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainState {
    Uninitialized,
    Initialized,
    Contributing(u64),
    Verified(u64),
    Finalized,
    Sealed,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainState::Uninitialized => write!(f, "uninitialized"),
            ChainState::Initialized => write!(f, "initialized"),
            ChainState::Contributing(index) => write!(f, "contributing {}", index),
            ChainState::Verified(index) => write!(f, "verified up to {}", index),
            ChainState::Finalized => write!(f, "finalized"),
            ChainState::Sealed => write!(f, "sealed"),
        }
    }
}

///
/// The ordered contributions of a ceremony and the transitions between them.
///
/// Contribution `i` only joins the trusted chain once `0..i` are verified,
/// and the ceremony can only be finalized once every expected contribution is.
/// Each CLI step runs in a fresh process, so a chain can be resumed at the
/// position implied by the step instead of being persisted.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionChain {
    expected_contributions: u64,
    state: ChainState,
    verified: BTreeMap<u64, Contribution>,
}

impl ContributionChain {
    pub fn new(expected_contributions: u64) -> Result<Self, CoordinatorError> {
        if expected_contributions == 0 {
            return Err(CoordinatorError::Argument(
                "a ceremony needs at least one contribution".to_string(),
            ));
        }
        Ok(Self {
            expected_contributions,
            state: ChainState::Uninitialized,
            verified: BTreeMap::new(),
        })
    }

    /// Returns a chain positioned right before contribution `index`.
    pub fn resume_before(index: u64, expected_contributions: u64) -> Result<Self, CoordinatorError> {
        let mut chain = Self::new(expected_contributions)?;
        if index >= expected_contributions {
            return Err(CoordinatorError::Argument(format!(
                "contribution {} is outside a ceremony of {} contributions",
                index, expected_contributions
            )));
        }
        chain.state = match index {
            0 => ChainState::Initialized,
            index => ChainState::Verified(index - 1),
        };
        Ok(chain)
    }

    /// Returns a chain whose contributions were all verified by earlier steps.
    pub fn resume_complete(expected_contributions: u64) -> Result<Self, CoordinatorError> {
        let mut chain = Self::new(expected_contributions)?;
        chain.state = ChainState::Verified(expected_contributions - 1);
        Ok(chain)
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn expected_contributions(&self) -> u64 {
        self.expected_contributions
    }

    /// Returns the contributions verified by this process, in index order.
    pub fn contributions(&self) -> impl Iterator<Item = &Contribution> {
        self.verified.values()
    }

    pub fn is_sealed(&self) -> bool {
        self.state == ChainState::Sealed
    }

    /// Returns the index the next contribution must have, if one is expected.
    pub fn next_index(&self) -> Option<u64> {
        let next = match self.state {
            ChainState::Initialized => 0,
            ChainState::Verified(index) => index + 1,
            _ => return None,
        };
        (next < self.expected_contributions).then_some(next)
    }

    pub fn ensure_uninitialized(&self) -> Result<(), CoordinatorError> {
        match self.state {
            ChainState::Uninitialized => Ok(()),
            state => Err(invalid(state, "initialize")),
        }
    }

    pub fn initialize(&mut self) -> Result<(), CoordinatorError> {
        self.ensure_uninitialized()?;
        self.transition(ChainState::Initialized);
        Ok(())
    }

    /// Checks that contribution `index` may start, without changing the state.
    pub fn ensure_can_contribute(&self, index: u64) -> Result<(), CoordinatorError> {
        match self.next_index() {
            Some(next) if next == index => Ok(()),
            _ => Err(invalid(self.state, &format!("contribute {}", index))),
        }
    }

    pub fn begin_contribution(&mut self, index: u64) -> Result<(), CoordinatorError> {
        self.ensure_can_contribute(index)?;
        self.transition(ChainState::Contributing(index));
        Ok(())
    }

    /// Checks that a verified contribution may be recorded, without changing the state.
    ///
    /// Besides the contribution in progress, this accepts the next contribution when it
    /// was uploaded by someone else, and verified contributions verified again.
    pub fn ensure_can_record(&self, contribution: &Contribution) -> Result<(), CoordinatorError> {
        let index = contribution.index;
        let action = format!("record contribution {}", index);
        if index >= self.expected_contributions {
            return Err(invalid(self.state, &action));
        }
        match self.state {
            ChainState::Contributing(current) if current == index => Ok(()),
            ChainState::Initialized if index == 0 => Ok(()),
            ChainState::Verified(last) if index == last + 1 => Ok(()),
            ChainState::Verified(last) | ChainState::Contributing(last) if index <= last => {
                match self.verified.get(&index) {
                    Some(recorded) if recorded.content_hash != contribution.content_hash => Err(
                        CoordinatorError::InvalidTransition {
                            state: self.state,
                            action: format!("{} with a different content hash than before", action),
                        },
                    ),
                    _ => Ok(()),
                }
            }
            state => Err(invalid(state, &action)),
        }
    }

    pub fn record_verified(&mut self, contribution: Contribution) -> Result<(), CoordinatorError> {
        self.ensure_can_record(&contribution)?;
        let index = contribution.index;
        let advances = match self.state {
            ChainState::Contributing(current) => current == index,
            ChainState::Initialized => true,
            ChainState::Verified(last) => index == last + 1,
            _ => false,
        };
        debug!("Recording {} as verified", contribution.key);
        self.verified.insert(index, contribution);
        if advances {
            self.transition(ChainState::Verified(index));
        }
        Ok(())
    }

    /// Moves to `Finalized` once every expected contribution is verified.
    /// Finalizing again is allowed, so an interrupted finalization can be re-run.
    pub fn begin_finalize(&mut self) -> Result<(), CoordinatorError> {
        match self.state {
            ChainState::Verified(last) if last + 1 == self.expected_contributions => {
                self.transition(ChainState::Finalized);
                Ok(())
            }
            ChainState::Finalized => Ok(()),
            state => Err(invalid(state, "finalize")),
        }
    }

    pub fn seal(&mut self) -> Result<(), CoordinatorError> {
        match self.state {
            ChainState::Finalized => {
                self.transition(ChainState::Sealed);
                Ok(())
            }
            state => Err(invalid(state, "seal")),
        }
    }

    fn transition(&mut self, next: ChainState) {
        trace!("Chain moves from {} to {}", self.state, next);
        self.state = next;
    }
}

fn invalid(state: ChainState, action: &str) -> CoordinatorError {
    CoordinatorError::InvalidTransition {
        state,
        action: action.to_string(),
    }
}
