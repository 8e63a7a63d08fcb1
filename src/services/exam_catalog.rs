use std::{collections::BTreeMap, sync::Arc};

use log::debug;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{Course, QuizModule},
        dto::{
            gateway::{ExamData, ExamDataCourse, ExamDataQuiz, ExamDataStats},
            request::ExamListQuery,
        },
    },
    repositories::QuizModuleRepository,
};

/// Course and quiz listing the exam server browses when setting up exams.
pub struct ExamCatalog {
    modules: Arc<dyn QuizModuleRepository>,
}

impl ExamCatalog {
    pub fn new(modules: Arc<dyn QuizModuleRepository>) -> Self {
        Self { modules }
    }

    pub async fn list(&self, query: &ExamListQuery) -> AppResult<ExamData> {
        let course_filter = query.course_filter().map_err(|_| {
            AppError::ValidationError(
                "course_ids must be a comma separated list of course ids".to_string(),
            )
        })?;

        let mut courses: BTreeMap<i64, (Course, Vec<QuizModule>)> = BTreeMap::new();
        for module in self.modules.list().await? {
            courses
                .entry(module.course.id)
                .or_insert_with(|| (module.course.clone(), Vec::new()))
                .1
                .push(module);
        }

        let page: Vec<(Course, Vec<QuizModule>)> = courses
            .into_values()
            .filter(|(course, _)| {
                course_filter
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&course.id))
            })
            .filter(|(course, _)| {
                !query.filter_courses
                    || query.matches(course.start_date, course.end_date, course.time_created)
            })
            .skip(query.start_needle as usize)
            .take(query.per_page as usize)
            .collect();

        if page.is_empty() {
            return Err(AppError::NotFound("No course found".to_string()));
        }

        let stats = ExamDataStats {
            coursecount: page.len() as u32,
            needle: query.start_needle,
            perpage: query.per_page,
        };

        let mut results = Vec::with_capacity(page.len());
        for (course, modules) in page {
            let quizzes: Vec<ExamDataQuiz> = modules
                .iter()
                .filter(|m| query.matches(m.time_open, m.time_close, m.time_created))
                .map(ExamDataQuiz::from)
                .collect();
            if quizzes.is_empty() && !query.show_empty_courses {
                debug!("Skipping course {} without matching quizzes", course.id);
                continue;
            }
            results.push(ExamDataCourse::new(&course, quizzes));
        }

        Ok(ExamData {
            stats,
            results,
            warnings: Vec::new(),
        })
    }
}
