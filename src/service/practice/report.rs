use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{PageTime, Slide, SlideNumber};

/// What a finished rehearsal hands to the results view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeReport {
    pub total_time: PageTime,
    pub page_times: BTreeMap<SlideNumber, PageTime>,
    pub slides: Vec<Slide>,
    pub goal_time: PageTime,
}

impl PracticeReport {
    /// Seconds over (positive) or under (negative) the goal time.
    pub fn goal_difference(&self) -> i64 {
        let total = i128::from(self.total_time.total_seconds());
        let goal = i128::from(self.goal_time.total_seconds());

        i64::try_from(total - goal).unwrap_or(if total > goal { i64::MAX } else { i64::MIN })
    }
}

impl std::fmt::Display for PracticeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "total {} (goal {})", self.total_time, self.goal_time)?;

        let difference = self.goal_difference();
        let sign = if difference < 0 { "-" } else { "+" };
        writeln!(
            f,
            "difference {sign}{}",
            PageTime::from_seconds(difference.unsigned_abs())
        )?;

        for (slide, time) in &self.page_times {
            writeln!(f, "  slide {slide:02}  {time}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_against_the_goal() {
        let report = PracticeReport {
            total_time: PageTime::from_seconds(290),
            page_times: [(1, PageTime::from_seconds(290))].into(),
            slides: vec![],
            goal_time: PageTime::from_seconds(300),
        };

        assert_eq!(report.goal_difference(), -10);
        assert!(report.to_string().contains("difference -00:10"));
    }

    #[test]
    fn difference_saturates_for_huge_goals() {
        let report = PracticeReport {
            total_time: PageTime::from_seconds(10),
            page_times: BTreeMap::new(),
            slides: vec![],
            goal_time: PageTime::from_seconds(u64::MAX),
        };

        assert_eq!(report.goal_difference(), i64::MIN);
        assert!(report.to_string().starts_with("total 00:10"));
    }

    #[test]
    fn serializes_with_results_view_field_names() {
        let report = PracticeReport {
            total_time: PageTime::from_seconds(65),
            page_times: [(2, PageTime::from_seconds(65))].into(),
            slides: vec![Slide::new(2, 2, "hi".to_string())],
            goal_time: PageTime::ZERO,
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["totalTime"]["minutes"], 1);
        assert_eq!(value["pageTimes"]["2"]["seconds"], 5);
        assert_eq!(value["slides"][0]["slideNumber"], 2);
    }
}
