//! Letter-grade evaluation
//!
//! Pure, total, and deterministic: every real score maps to a letter via a
//! fixed ladder of inclusive lower bounds evaluated highest first. Scores
//! below the lowest bound fall to F; an absent or unparsable score maps to
//! the "-" sentinel.

/// Sentinel shown when no score has been recorded
pub const NO_GRADE: &str = "-";

/// Inclusive lower bounds, highest first
const GRADE_LADDER: [(f64, &str); 8] = [
    (10.1, "A+"),
    (9.5, "A"),
    (8.5, "B+"),
    (8.0, "B"),
    (7.5, "C"),
    (7.0, "C-"),
    (6.0, "D"),
    (4.0, "D-"),
];

/// Map a numeric score to its letter grade.
pub fn letter_grade(score: Option<f64>) -> &'static str {
    let Some(score) = score else {
        return NO_GRADE;
    };
    if score.is_nan() {
        return NO_GRADE;
    }

    for (floor, letter) in GRADE_LADDER {
        if score >= floor {
            return letter;
        }
    }
    "F"
}

/// Map a stored raw score (text column) to its letter grade.
pub fn letter_grade_for_raw(raw: Option<&str>) -> &'static str {
    letter_grade(raw.and_then(|s| s.trim().parse::<f64>().ok()))
}
