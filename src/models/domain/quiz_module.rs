use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Course {
    pub id: i64,
    pub shortname: String,
    pub fullname: String,
    #[serde(default)]
    pub idnumber: String,
    #[serde(default)]
    pub summary: String,
    pub start_date: i64,
    #[serde(default)]
    pub end_date: i64,
    pub time_created: i64,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// A quiz placed in a course. `cmid` is the id the hand-off tokens are bound to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuizModule {
    pub cmid: i64,
    pub quiz_id: i64,
    pub name: String,
    #[serde(default)]
    pub intro: String,
    /// Unix seconds, 0 when unset.
    #[serde(default)]
    pub time_open: i64,
    #[serde(default)]
    pub time_close: i64,
    pub time_created: i64,
    #[serde(default)]
    pub has_attempts: bool,
    /// Users holding at least one finished attempt.
    #[serde(default)]
    pub finished_attempt_users: Vec<i64>,
    pub course: Course,
}

impl QuizModule {
    pub fn is_closed_at(&self, now: i64) -> bool {
        self.time_close > 0 && self.time_close < now
    }

    pub fn has_finished_attempt(&self, user_id: i64) -> bool {
        self.finished_attempt_users.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(time_close: i64) -> QuizModule {
        QuizModule {
            cmid: 7,
            quiz_id: 3,
            name: "Final".into(),
            intro: String::new(),
            time_open: 0,
            time_close,
            time_created: 0,
            has_attempts: false,
            finished_attempt_users: Vec::new(),
            course: Course {
                id: 2,
                shortname: "C2".into(),
                fullname: "Course 2".into(),
                idnumber: String::new(),
                summary: String::new(),
                start_date: 0,
                end_date: 0,
                time_created: 0,
                visible: true,
            },
        }
    }

    #[test]
    fn test_close_time() {
        assert!(!module(0).is_closed_at(1_000));
        assert!(!module(2_000).is_closed_at(1_000));
        assert!(module(500).is_closed_at(1_000));
    }

    #[test]
    fn test_finished_attempts_are_per_user() {
        let mut quiz = module(0);
        assert!(!quiz.has_finished_attempt(42));
        quiz.finished_attempt_users.push(42);
        assert!(quiz.has_finished_attempt(42));
        assert!(!quiz.has_finished_attempt(43));
    }
}
