// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quiz import documents. Accepts both structured JSON and the compact wire
// forms used by the sheet editor: label schemes as "A-B-C", answers as
// "A B", and distributions as "A 70;B 30".

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::Result;
use crate::types::{ChoiceLabelScheme, Question, QuizId, SheetConfiguration, Student};

/// A quiz definition together with its enrolled students.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizDocument {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<QuizId>,
    pub name: String,
    pub question_count: usize,
    pub choice_count: usize,
    pub label_scheme: String,
    #[serde(default)]
    pub fail_mark: f64,
    pub questions: Vec<QuestionDocument>,
    #[serde(default)]
    pub students: Vec<StudentDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDocument {
    /// Defaults to the question's position in the list, 1-based.
    #[serde(default)]
    pub ordinal: Option<usize>,
    pub correct: LabelList,
    #[serde(default)]
    pub wrong: Option<LabelList>,
    pub distribution: Distribution,
    pub total_mark: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentDocument {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// `"A B"` or `["A", "B"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LabelList {
    Compact(String),
    List(Vec<String>),
}

impl LabelList {
    pub fn labels(&self) -> BTreeSet<String> {
        match self {
            Self::Compact(raw) => Question::parse_labels(raw),
            Self::List(list) => list.iter().map(|l| l.trim().to_owned()).collect(),
        }
    }
}

/// `"A 70;B 30"` or `{"A": 70, "B": 30}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Distribution {
    Compact(String),
    Map(BTreeMap<String, f64>),
}

impl Distribution {
    pub fn weights(&self) -> Result<BTreeMap<String, f64>> {
        match self {
            Self::Compact(raw) => Question::parse_distribution(raw),
            Self::Map(map) => Ok(map.clone()),
        }
    }
}

impl QuizDocument {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Convert into the domain configuration and its students.
    pub fn into_parts(self) -> Result<(SheetConfiguration, Vec<Student>)> {
        let id = self.id.unwrap_or_default();
        let label_scheme: ChoiceLabelScheme = self.label_scheme.parse()?;

        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| {
                Ok(Question {
                    ordinal: q.ordinal.unwrap_or(i + 1),
                    correct_labels: q.correct.labels(),
                    distractor_labels: q.wrong.map(|w| w.labels()).unwrap_or_default(),
                    mark_distribution: q.distribution.weights()?,
                    total_mark: q.total_mark,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let students = self
            .students
            .into_iter()
            .map(|s| Student {
                code: s.code,
                name: s.name,
                email: s.email,
                quiz_id: id,
            })
            .collect();

        let quiz = SheetConfiguration {
            id,
            name: self.name,
            question_count: self.question_count,
            choice_count: self.choice_count,
            label_scheme,
            fail_mark: self.fail_mark,
            questions,
        };
        Ok((quiz, students))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_wire_forms_are_accepted() {
        let doc = QuizDocument::from_json(
            r#"{
                "name": "Geography",
                "question_count": 2,
                "choice_count": 4,
                "label_scheme": "A-B-C",
                "fail_mark": 1.5,
                "questions": [
                    {"correct": "A C", "wrong": "B D", "distribution": "A 70;C 30", "total_mark": 4},
                    {"correct": ["B"], "distribution": {"B": 100}, "total_mark": 2}
                ],
                "students": [{"code": "G1", "name": "Ravi"}]
            }"#,
        )
        .unwrap();
        let (quiz, students) = doc.into_parts().unwrap();

        assert_eq!(quiz.label_scheme, ChoiceLabelScheme::Alphabetic);
        assert_eq!(quiz.questions[0].ordinal, 1);
        assert_eq!(quiz.questions[0].weight_of("C"), Some(30.0));
        assert!(quiz.questions[0].distractor_labels.contains("D"));
        assert_eq!(quiz.questions[1].ordinal, 2);
        assert_eq!(students[0].quiz_id, quiz.id);
        assert_eq!(students[0].email, "");
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let doc = QuizDocument::from_json(
            r#"{"name": "X", "question_count": 0, "choice_count": 4,
                "label_scheme": "a-b-c", "questions": []}"#,
        )
        .unwrap();
        assert!(doc.into_parts().is_err());
    }
}
