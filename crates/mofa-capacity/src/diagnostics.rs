//! Remediation messages for configurations that do not fit
//!
//! Suggestions depend on which parameters the caller pinned and which
//! searches found a feasible value:
//!
//! ```text
//!                              max_length
//!                   | pinned              | defaulted
//! ------------------+---------------------+------------------------
//! batch   pinned    | length+batch, batch | batch, length
//!         defaulted | length              | length+batch, batch
//! ```
//!
//! Alternatives in one cell are joined with "or". When no search found a
//! feasible value a generic suggestion is given instead. The composer only
//! narrates search outcomes; it never calls the cost model.

use crate::report::to_mib;
use crate::search::SearchOutcome;
use serde::{Deserialize, Serialize};

/// Which parameters the caller supplied explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pinned {
    pub max_length: bool,
    pub max_batch_size: bool,
}

/// One actionable change that would make the configuration fit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    /// Pinned length can shrink; the batch size it supports is reported.
    ReduceLength {
        max_length: usize,
        supported_batch_size: usize,
    },
    /// Shrink the pinned length together with the batch size.
    ReduceLengthAndBatch {
        max_length: usize,
        max_batch_size: usize,
    },
    /// Pin both values explicitly.
    SetLengthAndBatch {
        max_length: usize,
        max_batch_size: usize,
    },
    /// Shrink the pinned batch size.
    ReduceBatch { max_batch_size: usize },
    /// Pin the batch size explicitly.
    SetBatch { max_batch_size: usize },
    /// Pin a length below the defaulted one.
    SetLength {
        max_length: usize,
        defaulted_from: usize,
    },
    /// Pinned length with no feasible shrink on its own.
    ReduceLengthOrBatch,
    /// Nothing found by search.
    Fallback,
}

impl std::fmt::Display for Suggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReduceLength {
                max_length,
                supported_batch_size,
            } => write!(
                f,
                "reducing --max-length to {max_length} (supports batch size of {supported_batch_size})"
            ),
            Self::ReduceLengthAndBatch {
                max_length,
                max_batch_size,
            } => write!(
                f,
                "reducing --max-length to {max_length} and --max-batch-size to {max_batch_size}"
            ),
            Self::SetLengthAndBatch {
                max_length,
                max_batch_size,
            } => write!(
                f,
                "setting --max-length to {max_length} and --max-batch-size to {max_batch_size}"
            ),
            Self::ReduceBatch { max_batch_size } => {
                write!(f, "reducing --max-batch-size to {max_batch_size}")
            }
            Self::SetBatch { max_batch_size } => {
                write!(f, "setting --max-batch-size to {max_batch_size}")
            }
            Self::SetLength {
                max_length,
                defaulted_from,
            } => write!(
                f,
                "setting --max-length to {max_length} (currently defaulted to {defaulted_from})"
            ),
            Self::ReduceLengthOrBatch => write!(f, "reducing --max-length or --max-batch-size"),
            Self::Fallback => write!(
                f,
                "reducing --max-length or --max-batch-size, finding a smaller model, or using a device with more memory"
            ),
        }
    }
}

/// Pick suggestions from the decision table.
pub fn suggest(
    pinned: Pinned,
    length: &SearchOutcome,
    batch: &SearchOutcome,
    original_length: usize,
) -> Vec<Suggestion> {
    let length_and_batch = |set: bool| {
        if set {
            Suggestion::SetLengthAndBatch {
                max_length: length.value,
                max_batch_size: length.companion,
            }
        } else {
            Suggestion::ReduceLengthAndBatch {
                max_length: length.value,
                max_batch_size: length.companion,
            }
        }
    };

    match (pinned.max_length, pinned.max_batch_size, length.found, batch.found) {
        (_, _, false, false) => vec![Suggestion::Fallback],

        (true, false, true, _) => vec![Suggestion::ReduceLength {
            max_length: length.value,
            supported_batch_size: length.companion,
        }],
        (true, false, false, _) => vec![Suggestion::ReduceLengthOrBatch],

        (true, true, length_found, batch_found) => {
            let mut out = Vec::new();
            if length_found {
                out.push(length_and_batch(false));
            }
            if batch_found {
                out.push(Suggestion::ReduceBatch {
                    max_batch_size: batch.value,
                });
            }
            out
        }

        (false, false, length_found, batch_found) => {
            let mut out = Vec::new();
            if length_found {
                out.push(length_and_batch(true));
            }
            if batch_found {
                out.push(Suggestion::SetBatch {
                    max_batch_size: batch.value,
                });
            }
            out
        }

        (false, true, length_found, batch_found) => {
            let mut out = Vec::new();
            if batch_found {
                out.push(Suggestion::ReduceBatch {
                    max_batch_size: batch.value,
                });
            }
            if length_found {
                out.push(Suggestion::SetLength {
                    max_length: length.value,
                    defaulted_from: original_length,
                });
            }
            out
        }
    }
}

/// Render the out-of-memory message for a set of suggestions.
pub fn render(suggestions: &[Suggestion], total_bytes: u64, free_memory_bytes: u64) -> String {
    let free = if free_memory_bytes > 0 {
        format!(" / {} MiB free", to_mib(free_memory_bytes))
    } else {
        String::new()
    };
    let alternatives: Vec<String> = suggestions.iter().map(ToString::to_string).collect();
    format!(
        "Estimated model and kv cache memory use exceeds available memory ({} MiB{free}). Try {}.",
        to_mib(total_bytes),
        alternatives.join(" or ")
    )
}

/// [`suggest`] then [`render`].
pub fn compose(
    pinned: Pinned,
    length: &SearchOutcome,
    batch: &SearchOutcome,
    original_length: usize,
    total_bytes: u64,
    free_memory_bytes: u64,
) -> (String, Vec<Suggestion>) {
    let suggestions = suggest(pinned, length, batch, original_length);
    let message = render(&suggestions, total_bytes, free_memory_bytes);
    (message, suggestions)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn found(value: usize, companion: usize) -> SearchOutcome {
        SearchOutcome {
            found: true,
            value,
            companion,
        }
    }

    fn missed() -> SearchOutcome {
        SearchOutcome {
            found: false,
            value: 1,
            companion: 1,
        }
    }

    fn pinned(max_length: bool, max_batch_size: bool) -> Pinned {
        Pinned {
            max_length,
            max_batch_size,
        }
    }

    #[test]
    fn test_no_feasible_value_gives_fallback_in_every_cell() {
        for (l, b) in [(true, true), (true, false), (false, true), (false, false)] {
            assert_eq!(
                suggest(pinned(l, b), &missed(), &missed(), 8192),
                vec![Suggestion::Fallback]
            );
        }
    }

    #[test]
    fn test_pinned_length_defaulted_batch() {
        let out = suggest(pinned(true, false), &found(2048, 4), &SearchOutcome::skipped(), 4096);
        assert_eq!(
            out,
            vec![Suggestion::ReduceLength {
                max_length: 2048,
                supported_batch_size: 4
            }]
        );
    }

    #[test]
    fn test_both_pinned_both_found_offers_both() {
        let out = suggest(pinned(true, true), &found(2900, 64), &found(45, 4096), 4096);
        assert_eq!(out.len(), 2);
        let (message, _) = compose(pinned(true, true), &found(2900, 64), &found(45, 4096), 4096, 11 * GIB, 9 * GIB);
        assert_eq!(
            message,
            "Estimated model and kv cache memory use exceeds available memory (11264 MiB / 9216 MiB free). \
             Try reducing --max-length to 2900 and --max-batch-size to 64 or reducing --max-batch-size to 45."
        );
    }

    #[test]
    fn test_both_pinned_only_batch_found() {
        let out = suggest(pinned(true, true), &missed(), &found(8, 4096), 4096);
        assert_eq!(out, vec![Suggestion::ReduceBatch { max_batch_size: 8 }]);
    }

    #[test]
    fn test_defaulted_length_pinned_batch_lists_batch_first() {
        let (message, suggestions) =
            compose(pinned(false, true), &found(1024, 32), &found(16, 8192), 8192, 20 * GIB, 16 * GIB);
        assert_eq!(suggestions.len(), 2);
        assert!(message.ends_with(
            "Try reducing --max-batch-size to 16 or setting --max-length to 1024 (currently defaulted to 8192)."
        ));
    }

    #[test]
    fn test_both_defaulted_sets_both() {
        let out = suggest(pinned(false, false), &found(1000, 3), &SearchOutcome::skipped(), 8192);
        assert_eq!(out[0].to_string(), "setting --max-length to 1000 and --max-batch-size to 3");
    }

    #[test]
    fn test_fallback_message_without_free_memory() {
        let message = render(&[Suggestion::Fallback], GIB, 0);
        assert_eq!(
            message,
            "Estimated model and kv cache memory use exceeds available memory (1024 MiB). \
             Try reducing --max-length or --max-batch-size, finding a smaller model, or using a device with more memory."
        );
    }

    #[test]
    fn test_suggestion_serde_tagged() {
        let json = serde_json::to_value(Suggestion::ReduceBatch { max_batch_size: 3 }).expect("serialize");
        assert_eq!(json["kind"], "reduce_batch");
        assert_eq!(json["max_batch_size"], 3);
    }
}
