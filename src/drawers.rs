//! The concrete filter drawers. Each one only supplies a schema and the
//! namespace its presets live under.

use crate::error::FilterError;
use crate::schema::{FieldDescriptor, Schema, SelectOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drawer {
    Classes,
    Exams,
    Teachers,
}

impl Drawer {
    pub const ALL: [Drawer; 3] = [Drawer::Classes, Drawer::Exams, Drawer::Teachers];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "classes" => Some(Self::Classes),
            "exams" => Some(Self::Exams),
            "teachers" => Some(Self::Teachers),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Classes => "classes",
            Self::Exams => "exams",
            Self::Teachers => "teachers",
        }
    }

    pub fn namespace(self) -> &'static str {
        match self {
            Self::Classes => "classFilterPresets",
            Self::Exams => "examFilterPresets",
            Self::Teachers => "teacherFilterPresets",
        }
    }

    /// Built-in fields. Teachers start empty: their schema comes from the
    /// form-schema service after the drawer opens.
    pub fn default_schema(self) -> Result<Schema, FilterError> {
        match self {
            Self::Classes => Schema::new(vec![
                FieldDescriptor::text("name", "Class name"),
                FieldDescriptor::select(
                    "grade_level",
                    "Grade",
                    (1..=12)
                        .map(|g| SelectOption::new(g.to_string(), format!("Grade {g}")))
                        .collect(),
                ),
                FieldDescriptor::text("academic_year", "Academic year"),
                FieldDescriptor::select(
                    "status",
                    "Status",
                    vec![
                        SelectOption::new("active", "Active"),
                        SelectOption::new("archived", "Archived"),
                    ],
                ),
            ]),
            Self::Exams => Schema::new(vec![
                FieldDescriptor::text("class_id", "Class"),
                FieldDescriptor::text("subject_id", "Subject"),
                FieldDescriptor::select(
                    "exam_type",
                    "Exam type",
                    vec![
                        SelectOption::new("quiz", "Quiz"),
                        SelectOption::new("midterm", "Midterm"),
                        SelectOption::new("final", "Final"),
                    ],
                ),
                FieldDescriptor::select(
                    "status",
                    "Status",
                    vec![
                        SelectOption::new("pending", "Pending"),
                        SelectOption::new("ongoing", "Ongoing"),
                        SelectOption::new("completed", "Completed"),
                    ],
                ),
                FieldDescriptor::date("exam_date", "Exam date"),
            ]),
            Self::Teachers => Schema::new(Vec::new()),
        }
    }
}
