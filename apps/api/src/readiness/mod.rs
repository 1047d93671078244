// Readiness: skill-gap percentages and role-scoped readiness score.
// Pure computation only; loading inputs is the propagator's job.

pub mod calculator;

pub use calculator::{compute_report, GapReport, SkillGap};
