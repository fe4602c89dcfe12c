use serde::Serialize;

use super::RetryError;

/// Why a view is showing fallback data instead of a live answer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FallbackReason {
    /// The backend kept answering 202 until the retry bound ran out.
    StillProcessing { attempts: u32 },
    /// Transport failure or non-2xx answer.
    Unavailable { message: String },
}

/// Where the data on screen came from. Every page resolves its fetch
/// through this type instead of deciding on a mock fallback by itself.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum DataSource<T> {
    Live { data: T },
    Fallback { data: Option<T>, reason: FallbackReason },
}

impl<T> DataSource<T> {
    /// Map a fetch outcome onto a data source. `fallback` is consulted only
    /// when the live fetch failed. A cancelled fetch yields `None`: the view
    /// that asked is gone.
    pub fn resolve(
        outcome: Result<T, RetryError>,
        fallback: impl FnOnce() -> Option<T>,
    ) -> Option<Self> {
        let reason = match outcome {
            Ok(data) => return Some(DataSource::Live { data }),
            Err(RetryError::Cancelled) => return None,
            Err(RetryError::Exhausted { attempts }) => FallbackReason::StillProcessing { attempts },
            Err(RetryError::Transport(err)) => FallbackReason::Unavailable {
                message: err.to_string(),
            },
        };
        Some(DataSource::Fallback {
            data: fallback(),
            reason,
        })
    }

    pub fn is_live(&self) -> bool {
        matches!(self, DataSource::Live { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            DataSource::Live { data } => Some(data),
            DataSource::Fallback { data, .. } => data.as_ref(),
        }
    }

    /// Text the user must see whenever fallback data is displayed.
    pub fn notice(&self) -> Option<String> {
        let DataSource::Fallback { data, reason } = self else {
            return None;
        };

        let cause = match reason {
            FallbackReason::StillProcessing { attempts } => {
                format!("the result was still being processed after {attempts} attempts")
            }
            FallbackReason::Unavailable { message } => {
                format!("the server could not be reached ({message})")
            }
        };

        Some(if data.is_some() {
            format!("Showing previously saved results because {cause}.")
        } else {
            format!("No results available because {cause}.")
        })
    }
}
