//! Due-date (vencimento) parsing and period membership.
//!
//! Decides which reporting period a record is visible in. An overdue
//! account rolls forward into every later period until it is paid, so a
//! May delinquency still shows on the June board unless its status is
//! terminal.
//!
//! All functions take `today` explicitly; callers pass the current local
//! date.

use chrono::{Datelike, NaiveDate};
use log::debug;

use super::models::Student;
use super::months;

/// Parse a "DD/MM/YYYY" or "DD/MM" due date into a concrete date.
///
/// Two-part dates carry no year and are assumed to be in the current one,
/// with a wrap correction at the year boundary: a due date that lands in
/// the future while its month precedes today's month (e.g. "28/12" read in
/// January) belongs to the previous year; one that lands in the past while
/// its month follows today's month (e.g. "05/01" read in December) belongs
/// to the next. Month precedence is cyclic: December precedes January.
pub fn parse_due_date(data_vencimento: &str, today: NaiveDate) -> Option<NaiveDate> {
    let trimmed = data_vencimento.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parts: Vec<&str> = trimmed.split('/').collect();

    match parts.len() {
        3 => {
            let day = parts[0].parse::<u32>().ok()?;
            let month = parts[1].parse::<u32>().ok()?;
            let year_raw = parts[2].parse::<i32>().ok()?;
            let year = if parts[2].len() == 2 { 2000 + year_raw } else { year_raw };
            NaiveDate::from_ymd_opt(year, month, day)
        }
        2 => {
            let day = parts[0].parse::<u32>().ok()?;
            let month = parts[1].parse::<u32>().ok()?;
            let naive = NaiveDate::from_ymd_opt(today.year(), month, day)?;

            // Cyclic month distances. A date in the future whose month sits
            // just behind today's (December read in January) wrapped from
            // last year; a date in the past whose month sits just ahead
            // (January read in December) wraps into the next.
            let months_behind = (today.month() as i32 - month as i32).rem_euclid(12);
            let months_ahead = (month as i32 - today.month() as i32).rem_euclid(12);
            let year = if naive > today && (1..=6).contains(&months_behind) {
                today.year() - 1
            } else if naive < today && (1..=5).contains(&months_ahead) {
                today.year() + 1
            } else {
                today.year()
            };
            NaiveDate::from_ymd_opt(year, month, day)
        }
        _ => None,
    }
}

/// Canonical "MM-YYYY" key of the month a due date falls in.
pub fn due_month_key(data_vencimento: &str, today: NaiveDate) -> Option<String> {
    parse_due_date(data_vencimento, today).map(months::key_for_date)
}

/// Days overdue as of `today`, never negative. An unparseable or empty due
/// date counts as zero days.
pub fn dias_atraso(data_vencimento: &str, today: NaiveDate) -> i64 {
    match parse_due_date(data_vencimento, today) {
        Some(due) => (today - due).num_days().max(0),
        None => 0,
    }
}

/// Whether a student record belongs to the `target` reporting period.
/// First match wins:
///
/// 1. the record's own `mes` names the target period;
/// 2. its due date falls inside the target month;
/// 3. the account is still open and fell due on or before the target
///    month (rollover);
/// 4. otherwise no. An empty due date with a non-matching `mes` is never
///    guessed into a period.
pub fn belongs_to_month(student: &Student, target_key: &str, today: NaiveDate) -> bool {
    if student.mes.eq_ignore_ascii_case(target_key)
        || months::resolve_legacy_key(&student.mes).as_deref() == Some(target_key)
    {
        return true;
    }

    let due_key = match due_month_key(&student.data_vencimento, today) {
        Some(key) => key,
        None => {
            debug!(
                "Student {} has no usable due date ('{}'); not guessing a period",
                student.id, student.data_vencimento
            );
            return false;
        }
    };

    if due_key == target_key {
        return true;
    }

    if !student.status.is_terminal() {
        if let (Some(due_first), Some(target_first)) =
            (months::first_of_month(&due_key), months::first_of_month(target_key))
        {
            return due_first <= target_first;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CollectionStatus, Student};
    use chrono::Utc;

    fn student(mes: &str, vencimento: &str, status: CollectionStatus) -> Student {
        let now = Utc::now();
        Student {
            id: Student::generate_id(),
            nome: "Aluno Teste".to_string(),
            curso: None,
            valor_devido: 200.0,
            data_vencimento: vencimento.to_string(),
            dias_atraso: 0,
            follow_up: String::new(),
            observacoes: String::new(),
            primeiro_contato: None,
            ultimo_contato: None,
            data_pagamento: None,
            mes: mes.to_string(),
            criado_por: None,
            status,
            historico: Vec::new(),
            follow_ups: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_full_due_date() {
        let today = date(2025, 6, 15);
        assert_eq!(parse_due_date("10/05/2025", today), Some(date(2025, 5, 10)));
        assert_eq!(parse_due_date("10/05/25", today), Some(date(2025, 5, 10)));
        assert_eq!(parse_due_date("", today), None);
        assert_eq!(parse_due_date("31/02/2025", today), None);
        assert_eq!(parse_due_date("10-05-2025", today), None);
    }

    #[test]
    fn test_parse_short_due_date_same_year() {
        // Normal case: a recently past due date stays in the current year
        let today = date(2025, 6, 7);
        assert_eq!(parse_due_date("10/05", today), Some(date(2025, 5, 10)));
        // Same-month future date also stays
        assert_eq!(parse_due_date("20/06", today), Some(date(2025, 6, 20)));
    }

    #[test]
    fn test_parse_short_due_date_year_boundary() {
        // "28/12" read in January means last December, not next
        let january = date(2026, 1, 15);
        assert_eq!(parse_due_date("28/12", january), Some(date(2025, 12, 28)));

        // "05/01" read in December means the coming January
        let december = date(2025, 12, 20);
        assert_eq!(parse_due_date("05/01", december), Some(date(2026, 1, 5)));
    }

    #[test]
    fn test_dias_atraso_never_negative() {
        let today = date(2025, 6, 15);
        assert_eq!(dias_atraso("05/06/2025", today), 10);
        assert_eq!(dias_atraso("20/06/2025", today), 0);
        assert_eq!(dias_atraso("", today), 0);
    }

    #[test]
    fn test_belongs_by_own_period_key() {
        let today = date(2025, 6, 15);
        let s = student("06-2025", "", CollectionStatus::Inadimplente);
        assert!(belongs_to_month(&s, "06-2025", today));
        // Legacy spelling of the same period also matches
        let legacy = student("JUNHO/25", "", CollectionStatus::Inadimplente);
        assert!(belongs_to_month(&legacy, "06-2025", today));
    }

    #[test]
    fn test_belongs_by_due_month() {
        let today = date(2025, 6, 15);
        let s = student("05-2025", "10/06/2025", CollectionStatus::PagamentoFeito);
        assert!(belongs_to_month(&s, "06-2025", today));
    }

    #[test]
    fn test_open_account_rolls_forward_paid_does_not() {
        let today = date(2025, 6, 15);
        // Open May delinquency shows on the June board
        let open = student("05-2025", "10/05/2025", CollectionStatus::Inadimplente);
        assert!(belongs_to_month(&open, "06-2025", today));

        // The same dates with payment recorded do not roll forward
        let paid = student("05-2025", "10/05/2025", CollectionStatus::PagamentoFeito);
        assert!(!belongs_to_month(&paid, "06-2025", today));
    }

    #[test]
    fn test_open_account_does_not_roll_backward() {
        let today = date(2025, 6, 15);
        let s = student("06-2025", "10/06/2025", CollectionStatus::Inadimplente);
        assert!(!belongs_to_month(&s, "05-2025", today));
    }

    #[test]
    fn test_empty_due_date_never_guessed() {
        let today = date(2025, 6, 15);
        let s = student("05-2025", "", CollectionStatus::Inadimplente);
        assert!(!belongs_to_month(&s, "06-2025", today));
    }
}
