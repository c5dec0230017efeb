use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{
    CurriculumSubject, User, UserRole, UserStatus, WhitelistEntry, WhitelistStatus,
};
use crate::utils::password;

/// Password given to the built-in accounts on first start
pub const DEFAULT_PASSWORD: &str = "password123";

/// Administrator and faculty accounts written when no user table exists
pub fn default_users() -> Result<Vec<User>, AppError> {
    let hashed = password::hash(DEFAULT_PASSWORD)
        .map_err(|e| AppError::storage(e.to_string()))?;

    let account = |id: &str, name: &str, email: &str, role: UserRole| User {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        password: Some(hashed.clone()),
        role,
        status: UserStatus::Active,
        student_number: None,
        last_login: None,
        phone_number: None,
        department: None,
        settings: None,
    };

    Ok(vec![
        account("1", "ADMIN", "admin@cvsu.edu.ph", UserRole::Admin),
        account("2", "PROFESSOR", "faculty@cvsu.edu.ph", UserRole::Faculty),
    ])
}

/// The four core board-exam subjects, as empty shells
pub fn initial_subjects() -> Vec<CurriculumSubject> {
    [
        (
            "s-1",
            "Theories of Personality",
            "Comprehensive study of major personality theories and their applications in clinical and social contexts.",
            "#1e40af",
        ),
        (
            "s-2",
            "Abnormal Psychology",
            "Examination of psychopathology, diagnostic criteria, and various clinical perspectives on mental health.",
            "#b91c1c",
        ),
        (
            "s-3",
            "Industrial Psychology",
            "Psychological principles applied to organizational behavior, workforce management, and human resources.",
            "#047857",
        ),
        (
            "s-4",
            "Psychological Assessment",
            "Foundations of psychometrics, psychological testing methodologies, and professional evaluation standards.",
            "#7c3aed",
        ),
    ]
    .into_iter()
    .map(|(id, name, description, color)| CurriculumSubject {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        color: color.to_string(),
        topics: vec![],
        status: None,
        author_name: None,
        last_updated: None,
        revision_notes: vec![],
    })
    .collect()
}

/// Sample pre-registration entries shown before any upload
pub fn initial_whitelist() -> Vec<WhitelistEntry> {
    [
        ("1", "Maria Santos", "202110123", "maria.santos@cvsu.edu.ph", WhitelistStatus::Registered, (2024, 3, 1)),
        ("2", "James Wilson", "202110456", "james.wilson@cvsu.edu.ph", WhitelistStatus::Pending, (2024, 3, 5)),
        ("3", "Liza Ramos", "202110789", "liza.ramos@cvsu.edu.ph", WhitelistStatus::Registered, (2024, 3, 10)),
        ("4", "Kevin Durant", "202110111", "kevin.durant@cvsu.edu.ph", WhitelistStatus::Pending, (2024, 3, 12)),
    ]
    .into_iter()
    .filter_map(|(id, name, number, email, status, (y, m, d))| {
        Some(WhitelistEntry {
            id: id.to_string(),
            email: email.to_string(),
            student_number: number.to_string(),
            name: name.to_string(),
            status,
            approved_by: None,
            date_added: NaiveDate::from_ymd_opt(y, m, d)?,
        })
    })
    .collect()
}
