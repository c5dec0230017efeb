use std::collections::HashSet;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    access::perm,
    db::WhitelistExt,
    dtos::{
        BulkImportResultDto, ColumnMappingDto, PageDto, RequestQueryDto, Response,
        WhitelistEntryDto, paginate,
    },
    error::{AppError, ErrorMessage},
    handler::{authorize, db_error, record_activity, validate_input},
    models::{User, WhitelistEntry, WhitelistStatus},
    seed,
    store::keys,
    utils::{sheet::Sheet, text::matches_query},
};

const DEFAULT_NAME: &str = "Unknown Student";
const DEFAULT_STUDENT_NUMBER: &str = "0000000";
const DEFAULT_EMAIL: &str = "no-email@cvsu.edu.ph";

fn not_found() -> AppError {
    AppError::not_found(ErrorMessage::WhitelistEntryNotFound.to_string())
}

fn duplicate_number() -> AppError {
    AppError::validation(ErrorMessage::StudentNumberExists.to_string())
}

/// Sample entries stand in until the first successful write stores them
fn load_or_seed(app_state: &AppState) -> Result<Vec<WhitelistEntry>, AppError> {
    let db = &app_state.db_client;
    if !db.has_key(keys::WHITELIST)? {
        return Ok(seed::initial_whitelist());
    }
    db.load_whitelist().map_err(|e| db_error("loading whitelist", e))
}

fn persist(app_state: &AppState, entries: &[WhitelistEntry]) -> Result<(), AppError> {
    app_state
        .db_client
        .save_whitelist(entries)
        .map_err(|e| db_error("saving whitelist", e))
}

pub async fn list_whitelist(
    app_state: &AppState,
    actor: &User,
    query: RequestQueryDto,
) -> Result<PageDto<WhitelistEntry>, AppError> {
    validate_input(&query, "list_whitelist")?;
    authorize(app_state, actor, perm::MANAGE_WHITELIST)?;

    let rows: Vec<WhitelistEntry> = load_or_seed(app_state)?
        .into_iter()
        .filter(|e| {
            matches_query(query.search_term(), &[&e.name, &e.student_number, &e.email])
        })
        .collect();
    Ok(paginate(rows, &query))
}

/// Adds a single student as PENDING, dated today
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id, student_number = %body.student_number))]
pub async fn add_entry(
    app_state: &AppState,
    actor: &User,
    body: WhitelistEntryDto,
) -> Result<WhitelistEntry, AppError> {
    validate_input(&body, "add_entry")?;
    authorize(app_state, actor, perm::MANAGE_WHITELIST)?;

    let mut entries = load_or_seed(app_state)?;
    let student_number = body.student_number.trim().to_string();
    if entries.iter().any(|e| e.student_number == student_number) {
        return Err(duplicate_number());
    }

    app_state.latency.pause().await;

    let entry = WhitelistEntry {
        id: Uuid::new_v4().to_string(),
        email: body.email.trim().to_string(),
        student_number,
        name: body.name.trim().to_string(),
        status: WhitelistStatus::Pending,
        approved_by: None,
        date_added: Utc::now().date_naive(),
    };
    entries.push(entry.clone());
    persist(app_state, &entries)?;

    record_activity(app_state, actor, "Whitelisted Student", &entry.name);
    tracing::info!("add_entry successful");
    Ok(entry)
}

/// Edits an entry; moving it to REGISTERED records who approved it
#[instrument(skip(app_state, actor, body), fields(actor = %actor.id))]
pub async fn update_entry(
    app_state: &AppState,
    actor: &User,
    entry_id: &str,
    body: WhitelistEntryDto,
) -> Result<WhitelistEntry, AppError> {
    validate_input(&body, "update_entry")?;
    authorize(app_state, actor, perm::MANAGE_WHITELIST)?;

    let mut entries = load_or_seed(app_state)?;
    let student_number = body.student_number.trim().to_string();
    if entries
        .iter()
        .any(|e| e.student_number == student_number && e.id != entry_id)
    {
        return Err(duplicate_number());
    }
    let index = entries
        .iter()
        .position(|e| e.id == entry_id)
        .ok_or_else(not_found)?;

    app_state.latency.pause().await;

    let entry = &mut entries[index];
    entry.name = body.name.trim().to_string();
    entry.email = body.email.trim().to_string();
    entry.student_number = student_number;
    if let Some(status) = body.status {
        if status == WhitelistStatus::Registered && entry.status != WhitelistStatus::Registered {
            entry.approved_by = Some(actor.name.clone());
        }
        entry.status = status;
    }
    let updated = entry.clone();
    persist(app_state, &entries)?;

    record_activity(app_state, actor, "Updated Whitelist Entry", &updated.name);
    tracing::info!("update_entry successful");
    Ok(updated)
}

#[instrument(skip(app_state, actor), fields(actor = %actor.id))]
pub async fn delete_entry(
    app_state: &AppState,
    actor: &User,
    entry_id: &str,
) -> Result<Response, AppError> {
    authorize(app_state, actor, perm::MANAGE_WHITELIST)?;

    let mut entries = load_or_seed(app_state)?;
    let index = entries
        .iter()
        .position(|e| e.id == entry_id)
        .ok_or_else(not_found)?;

    app_state.latency.pause().await;

    let removed = entries.remove(index);
    persist(app_state, &entries)?;

    record_activity(app_state, actor, "Removed Whitelist Entry", &removed.name);
    tracing::info!("delete_entry successful");
    Ok(Response::success(format!(
        "{} was removed from the whitelist.",
        removed.name
    )))
}

/// Imports every data row of `sheet` through a column mapping
///
/// Empty cells fall back to placeholder values. A row is skipped when its
/// student number is already on the list or appeared on an earlier row of
/// the same sheet.
#[instrument(skip(app_state, actor, sheet, mapping), fields(actor = %actor.id, rows = sheet.len()))]
pub async fn bulk_import(
    app_state: &AppState,
    actor: &User,
    sheet: &Sheet,
    mapping: ColumnMappingDto,
) -> Result<BulkImportResultDto, AppError> {
    validate_input(&mapping, "bulk_import")?;
    authorize(app_state, actor, perm::MANAGE_WHITELIST)?;

    let name_col = sheet.column(&mapping.name)?;
    let number_col = sheet.column(&mapping.student_number)?;
    let email_col = sheet.column(&mapping.email)?;

    let mut entries = load_or_seed(app_state)?;
    let mut seen: HashSet<String> = entries.iter().map(|e| e.student_number.clone()).collect();
    let today = Utc::now().date_naive();

    let mut added = Vec::new();
    let mut skipped = 0;
    for row in 0..sheet.len() {
        let student_number = sheet
            .cell(row, number_col)
            .unwrap_or(DEFAULT_STUDENT_NUMBER)
            .to_string();
        if !seen.insert(student_number.clone()) {
            skipped += 1;
            continue;
        }
        added.push(WhitelistEntry {
            id: Uuid::new_v4().to_string(),
            email: sheet.cell(row, email_col).unwrap_or(DEFAULT_EMAIL).to_string(),
            student_number,
            name: sheet.cell(row, name_col).unwrap_or(DEFAULT_NAME).to_string(),
            status: WhitelistStatus::Pending,
            approved_by: None,
            date_added: today,
        });
    }

    let result = BulkImportResultDto {
        added: added.len(),
        skipped,
    };
    if added.is_empty() {
        tracing::info!(skipped, "bulk_import found nothing new");
        return Ok(result);
    }

    app_state.latency.pause().await;

    entries.extend(added);
    persist(app_state, &entries)?;

    record_activity(
        app_state,
        actor,
        "Bulk Imported Whitelist",
        &format!("{} entries", result.added),
    );
    tracing::info!(added = result.added, skipped, "bulk_import successful");
    Ok(result)
}
