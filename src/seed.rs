// src/seed.rs

//! Reference data inserted into an empty database.

use sqlx::PgPool;

use crate::{error::AppError, models::level::NewLevel};

/// One level per book, in reading order.
const BOOKS: &[&str] = &[
    "Gênesis",
    "Êxodo",
    "Levítico",
    "Números",
    "Deuteronômio",
    "Josué",
    "Juízes",
    "Rute",
    "1 Samuel",
    "2 Samuel",
    "1 Reis",
    "2 Reis",
];

struct Achievement {
    name: &'static str,
    description: &'static str,
    requirement_type: &'static str,
    requirement_value: i32,
}

const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        name: "Iniciante",
        description: "Completou 10 fases",
        requirement_type: "completed_levels",
        requirement_value: 10,
    },
    Achievement {
        name: "Estudioso",
        description: "Completou 50 fases",
        requirement_type: "completed_levels",
        requirement_value: 50,
    },
    Achievement {
        name: "Mestre Bíblico",
        description: "Completou 100 fases",
        requirement_type: "completed_levels",
        requirement_value: 100,
    },
    Achievement {
        name: "Perfeição",
        description: "Conseguiu 3 estrelas em 10 fases",
        requirement_type: "three_stars",
        requirement_value: 10,
    },
    Achievement {
        name: "Velocista",
        description: "Completou uma fase em menos de 1 minuto",
        requirement_type: "fast_completion",
        requirement_value: 60,
    },
    Achievement {
        name: "Dedicado",
        description: "Jogou por 7 dias consecutivos",
        requirement_type: "consecutive_days",
        requirement_value: 7,
    },
];

/// (question, options A-D, correct letter) for the first level.
const GENESIS_QUESTIONS: &[(&str, [&str; 4], &str)] = &[
    (
        "Quem foi o primeiro homem criado por Deus?",
        ["Noé", "Adão", "Abraão", "Moisés"],
        "B",
    ),
    (
        "Quantos dias Deus levou para criar o mundo segundo Gênesis?",
        ["3 dias", "6 dias", "7 dias", "40 dias"],
        "B",
    ),
    (
        "Quem construiu a arca?",
        ["Abraão", "Moisés", "Noé", "Davi"],
        "C",
    ),
];

/// The book levels with their default question count.
pub fn book_levels() -> Vec<NewLevel> {
    BOOKS
        .iter()
        .zip(1..)
        .map(|(book, order)| {
            NewLevel::new(book, &format!("Perguntas sobre o livro de {}", book), order)
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub levels: usize,
    pub achievements: usize,
    pub questions: usize,
}

/// Seeds levels, achievements and the sample questions.
/// Each table is only filled when it is empty, so reruns are harmless.
pub async fn seed_reference_data(pool: &PgPool) -> Result<SeedSummary, AppError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    let (level_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM levels")
        .fetch_one(&mut *tx)
        .await?;

    let mut first_level_id = None;
    if level_count == 0 {
        for level in book_levels() {
            let (id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO levels (name, description, order_number, questions_count)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(&level.name)
            .bind(&level.description)
            .bind(level.order_number)
            .bind(level.questions_count)
            .fetch_one(&mut *tx)
            .await?;

            if level.order_number == 1 {
                first_level_id = Some(id);
            }
            summary.levels += 1;
        }
    } else {
        tracing::debug!("levels already present, skipping");
    }

    let (achievement_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM achievements")
        .fetch_one(&mut *tx)
        .await?;

    if achievement_count == 0 {
        for achievement in ACHIEVEMENTS {
            sqlx::query(
                r#"
                INSERT INTO achievements (name, description, requirement_type, requirement_value)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(achievement.name)
            .bind(achievement.description)
            .bind(achievement.requirement_type)
            .bind(achievement.requirement_value)
            .execute(&mut *tx)
            .await?;
            summary.achievements += 1;
        }
    }

    // Sample questions only go into a freshly created first level.
    if let Some(level_id) = first_level_id {
        for (text, [a, b, c, d], correct) in GENESIS_QUESTIONS {
            sqlx::query(
                r#"
                INSERT INTO questions
                    (level_id, question_text, option_a, option_b, option_c, option_d, correct_answer)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(level_id)
            .bind(*text)
            .bind(*a)
            .bind(*b)
            .bind(*c)
            .bind(*d)
            .bind(*correct)
            .execute(&mut *tx)
            .await?;
            summary.questions += 1;
        }
    }

    tx.commit().await?;

    tracing::info!(
        levels = summary.levels,
        achievements = summary.achievements,
        questions = summary.questions,
        "Reference data seeded"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use crate::config::DEFAULT_QUESTIONS_COUNT;

    use super::*;

    #[test]
    fn test_book_levels_are_ordered() {
        let levels = book_levels();
        assert_eq!(levels.len(), 12);
        assert_eq!(levels[0].name, "Gênesis");
        assert_eq!(levels[0].order_number, 1);
        assert_eq!(levels[11].name, "2 Reis");
        assert_eq!(levels[11].order_number, 12);
        assert_eq!(
            levels[7].description.as_deref(),
            Some("Perguntas sobre o livro de Rute")
        );
        assert!(levels.iter().all(|l| l.questions_count == DEFAULT_QUESTIONS_COUNT));
    }

    #[test]
    fn test_sample_questions_have_valid_keys() {
        for (_, _, correct) in GENESIS_QUESTIONS {
            assert!(["A", "B", "C", "D"].contains(correct));
        }
        assert_eq!(ACHIEVEMENTS.len(), 6);
    }
}
