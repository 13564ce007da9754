use chrono::{DateTime, SubsecRound, Utc};

/// Wall-clock now, truncated to whole seconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
