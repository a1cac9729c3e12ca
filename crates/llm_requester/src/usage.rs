//! Token and latency accounting for chat calls.
//!
//! `UsageMetrics` is additive: every chat turn produces one, and callers fold
//! them together with [`UsageMetrics::increase_usage`], per file and per run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Usage numbers as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    #[serde(default, with = "duration_millis")]
    pub duration: Duration,
    /// Prompt size counted locally before dispatch; only set when the model has
    /// `local_token_check` enabled.
    #[serde(default)]
    pub evaluated_prompt_tokens: Option<u64>,
    #[serde(default)]
    pub provider_usage: ProviderUsage,
}

impl UsageMetrics {
    /// Adds `other` into `self`. A `None` operand leaves `self` unchanged.
    pub fn increase_usage(&mut self, other: Option<&UsageMetrics>) {
        let Some(other) = other else {
            return;
        };
        self.duration += other.duration;
        self.evaluated_prompt_tokens = match (self.evaluated_prompt_tokens, other.evaluated_prompt_tokens) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
        };
        self.provider_usage.prompt_tokens += other.provider_usage.prompt_tokens;
        self.provider_usage.completion_tokens += other.provider_usage.completion_tokens;
        self.provider_usage.total_tokens += other.provider_usage.total_tokens;
    }
}

impl fmt::Display for UsageMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration: {:.2?}", self.duration)?;
        if let Some(evaluated) = self.evaluated_prompt_tokens {
            write!(f, ", Evaluated Prompt Tokens: {}", evaluated)?;
        }
        write!(
            f,
            ", Prompt Tokens: {}, Completion Tokens: {}, Total Tokens: {}",
            self.provider_usage.prompt_tokens,
            self.provider_usage.completion_tokens,
            self.provider_usage.total_tokens
        )
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ms: u64, prompt: u64, completion: u64, evaluated: Option<u64>) -> UsageMetrics {
        UsageMetrics {
            duration: Duration::from_millis(ms),
            evaluated_prompt_tokens: evaluated,
            provider_usage: ProviderUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            },
        }
    }

    #[test]
    fn test_merge_order_does_not_change_totals() {
        let a = sample(10, 1, 2, Some(5));
        let b = sample(20, 3, 4, None);
        let c = sample(30, 5, 6, Some(7));

        let mut abc = UsageMetrics::default();
        for m in [&a, &b, &c] {
            abc.increase_usage(Some(m));
        }
        let mut cba = UsageMetrics::default();
        for m in [&c, &b, &a] {
            cba.increase_usage(Some(m));
        }

        assert_eq!(abc, cba);
        assert_eq!(abc.duration, Duration::from_millis(60));
        assert_eq!(abc.provider_usage.total_tokens, 21);
        assert_eq!(abc.evaluated_prompt_tokens, Some(12));
    }

    #[test]
    fn test_merge_none_is_noop() {
        let mut a = sample(10, 1, 2, None);
        let before = a.clone();
        a.increase_usage(None);
        assert_eq!(a, before);
    }

    #[test]
    fn test_duration_serialized_as_millis() {
        let json = serde_json::to_value(sample(1500, 0, 0, None)).unwrap();
        assert_eq!(json["duration"], 1500);
    }
}
