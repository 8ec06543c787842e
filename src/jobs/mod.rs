pub mod prolong;

pub use prolong::{JobReport, MidnightProlongationJob};
