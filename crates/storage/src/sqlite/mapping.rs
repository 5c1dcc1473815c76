use worksheet_core::model::{ProblemId, Subject, WorksheetId, WorksheetRef};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn problem_id_from_i64(v: i64) -> Result<ProblemId, StorageError> {
    Ok(ProblemId::new(i64_to_u64("problem_id", v)?))
}

pub(crate) fn parse_subject(s: &str) -> Result<Subject, StorageError> {
    s.parse::<Subject>().map_err(ser)
}

/// Primary-key columns of a worksheet.
pub(crate) fn worksheet_key(worksheet: WorksheetRef) -> Result<(&'static str, i64), StorageError> {
    Ok((
        worksheet.subject.as_str(),
        id_i64("worksheet_id", worksheet.worksheet_id.value())?,
    ))
}

pub(crate) fn worksheet_from_row(subject: &str, worksheet_id: i64) -> Result<WorksheetRef, StorageError> {
    Ok(WorksheetRef::new(
        parse_subject(subject)?,
        WorksheetId::new(i64_to_u64("worksheet_id", worksheet_id)?),
    ))
}
