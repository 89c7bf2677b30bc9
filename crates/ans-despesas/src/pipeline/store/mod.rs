//! Relational store for the pipeline outputs and the read queries behind
//! the reporting API. One run replaces the previous run's rows wholesale;
//! the store never accumulates across runs.

use crate::pipeline::domain::{AggregatedStat, EnrichedRecord, RegistryEntry};
use rusqlite::params;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

// The connection type is part of this module's API surface: callers hold
// the handle and pass it into the load/query functions.
pub use rusqlite::Connection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no operator registered with CNPJ {cnpj}")]
    OperatorNotFound { cnpj: String },
    #[error("database failure")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS operadoras (
    registro_ans   TEXT PRIMARY KEY,
    cnpj           TEXT NOT NULL,
    razao_social   TEXT NOT NULL,
    modalidade     TEXT,
    uf             TEXT
);

CREATE TABLE IF NOT EXISTS despesas (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    registro_ans     TEXT NOT NULL,
    ano              INTEGER NOT NULL,
    trimestre        INTEGER NOT NULL,
    valor_despesas   REAL NOT NULL,
    descricao        TEXT,
    status_validacao TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_despesas_registro ON despesas (registro_ans);

CREATE TABLE IF NOT EXISTS agregados (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    razao_social     TEXT NOT NULL,
    uf               TEXT,
    total_despesas   REAL NOT NULL,
    media_trimestre  REAL,
    desvio_padrao    REAL
);
";

/// Opens (creating when needed) the database and ensures the schema.
pub fn open(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// In-memory store, used by tests and ephemeral runs.
pub fn open_in_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub operators: usize,
    pub expenses: usize,
    pub aggregates: usize,
}

/// Replaces the store contents with one run's datasets. The whole load is
/// a single transaction so readers never observe a half-written run.
pub fn load_run(
    conn: &mut Connection,
    operators: &[RegistryEntry],
    records: &[EnrichedRecord],
    stats: &[AggregatedStat],
) -> Result<LoadSummary, StoreError> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM agregados", [])?;
    tx.execute("DELETE FROM despesas", [])?;
    tx.execute("DELETE FROM operadoras", [])?;

    {
        let mut insert = tx.prepare(
            "INSERT INTO operadoras (registro_ans, cnpj, razao_social, modalidade, uf)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for operator in operators {
            insert.execute(params![
                operator.registry_id,
                operator.national_id,
                operator.legal_name,
                operator.category,
                operator.region_code,
            ])?;
        }

        let mut insert = tx.prepare(
            "INSERT INTO despesas (registro_ans, ano, trimestre, valor_despesas, descricao, status_validacao)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for record in records {
            insert.execute(params![
                record.registry_id,
                record.period.year,
                record.period.quarter,
                record.expense_value,
                record.description,
                record.verdict.to_string(),
            ])?;
        }

        let mut insert = tx.prepare(
            "INSERT INTO agregados (razao_social, uf, total_despesas, media_trimestre, desvio_padrao)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for stat in stats {
            insert.execute(params![
                stat.legal_name,
                stat.region_code,
                stat.total_expense,
                stat.quarterly_mean,
                stat.quarterly_deviation,
            ])?;
        }
    }

    tx.commit()?;
    Ok(LoadSummary {
        operators: operators.len(),
        expenses: records.len(),
        aggregates: stats.len(),
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperatorView {
    pub registro_ans: String,
    pub cnpj: String,
    pub razao_social: String,
    pub modalidade: Option<String>,
    pub uf: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExpenseView {
    pub ano: i32,
    pub trimestre: u8,
    pub valor_despesas: f64,
    pub descricao: Option<String>,
    pub status_validacao: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuarterlyTotal {
    pub ano: i32,
    pub trimestre: u8,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperatorTotal {
    pub razao_social: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegionTotal {
    pub uf: Option<String>,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatisticsView {
    pub total_geral: f64,
    pub media_geral: f64,
    pub top_operadoras: Vec<OperatorTotal>,
    pub distribuicao_uf: Vec<RegionTotal>,
}

pub fn list_operators(conn: &Connection) -> Result<Vec<OperatorView>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT registro_ans, cnpj, razao_social, modalidade, uf
         FROM operadoras ORDER BY razao_social, registro_ans",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(OperatorView {
                registro_ans: row.get(0)?,
                cnpj: row.get(1)?,
                razao_social: row.get(2)?,
                modalidade: row.get(3)?,
                uf: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn operator_by_cnpj(conn: &Connection, cnpj: &str) -> Result<Option<OperatorView>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT registro_ans, cnpj, razao_social, modalidade, uf
         FROM operadoras WHERE cnpj = ?1 ORDER BY registro_ans LIMIT 1",
    )?;
    let mut rows = stmt.query_map([cnpj], |row| {
        Ok(OperatorView {
            registro_ans: row.get(0)?,
            cnpj: row.get(1)?,
            razao_social: row.get(2)?,
            modalidade: row.get(3)?,
            uf: row.get(4)?,
        })
    })?;
    rows.next().transpose().map_err(StoreError::from)
}

pub fn expenses_for_operator(
    conn: &Connection,
    cnpj: &str,
) -> Result<Vec<ExpenseView>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT d.ano, d.trimestre, d.valor_despesas, d.descricao, d.status_validacao
         FROM despesas d
         JOIN operadoras o ON o.registro_ans = d.registro_ans
         WHERE o.cnpj = ?1
         ORDER BY d.ano, d.trimestre, d.id",
    )?;
    let rows = stmt
        .query_map([cnpj], |row| {
            Ok(ExpenseView {
                ano: row.get(0)?,
                trimestre: row.get(1)?,
                valor_despesas: row.get(2)?,
                descricao: row.get(3)?,
                status_validacao: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Quarterly totals for one operator, the series behind the expense chart.
pub fn quarterly_totals(conn: &Connection, cnpj: &str) -> Result<Vec<QuarterlyTotal>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT d.ano, d.trimestre, SUM(d.valor_despesas)
         FROM despesas d
         JOIN operadoras o ON o.registro_ans = d.registro_ans
         WHERE o.cnpj = ?1
         GROUP BY d.ano, d.trimestre
         ORDER BY d.ano, d.trimestre",
    )?;
    let rows = stmt
        .query_map([cnpj], |row| {
            Ok(QuarterlyTotal {
                ano: row.get(0)?,
                trimestre: row.get(1)?,
                total: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn statistics(conn: &Connection) -> Result<StatisticsView, StoreError> {
    let (total_geral, media_geral) = conn.query_row(
        "SELECT COALESCE(SUM(valor_despesas), 0), COALESCE(AVG(valor_despesas), 0) FROM despesas",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT o.razao_social, SUM(d.valor_despesas) AS total
         FROM despesas d
         JOIN operadoras o ON o.registro_ans = d.registro_ans
         GROUP BY o.razao_social
         ORDER BY total DESC, o.razao_social
         LIMIT 5",
    )?;
    let top_operadoras = stmt
        .query_map([], |row| {
            Ok(OperatorTotal {
                razao_social: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT o.uf, SUM(d.valor_despesas) AS total
         FROM despesas d
         JOIN operadoras o ON o.registro_ans = d.registro_ans
         GROUP BY o.uf
         ORDER BY o.uf",
    )?;
    let distribuicao_uf = stmt
        .query_map([], |row| {
            Ok(RegionTotal {
                uf: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StatisticsView {
        total_geral,
        media_geral,
        top_operadoras,
        distribuicao_uf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::domain::{Period, ValidationVerdict, Violation};

    fn operator(registry_id: &str, cnpj: &str, name: &str, uf: &str) -> RegistryEntry {
        RegistryEntry {
            registry_id: registry_id.to_string(),
            legal_name: name.to_string(),
            national_id: cnpj.to_string(),
            category: "Medicina de Grupo".to_string(),
            region_code: uf.to_string(),
        }
    }

    fn expense(registry_id: &str, period: Period, value: f64) -> EnrichedRecord {
        EnrichedRecord {
            registry_id: registry_id.to_string(),
            description: "EVENTOS".to_string(),
            period,
            expense_value: value,
            legal_name: Some("ADM LIFE".to_string()),
            national_id: Some("00366982000130".to_string()),
            category: Some("Medicina de Grupo".to_string()),
            region_code: Some("SP".to_string()),
            verdict: ValidationVerdict::Valid,
        }
    }

    fn seeded() -> Connection {
        let mut conn = open_in_memory().expect("store opens");
        let operators = vec![
            operator("344800", "00366982000130", "ADM LIFE", "SP"),
            operator("999999", "11222333000181", "OUTRA OPERADORA", "RJ"),
        ];
        let mut invalid = expense("999999", Period::new(2025, 1), -5.0);
        invalid.verdict = ValidationVerdict::Invalid(vec![Violation::NegativeValue]);
        let records = vec![
            expense("344800", Period::new(2025, 1), 100.0),
            expense("344800", Period::new(2025, 1), 50.0),
            expense("344800", Period::new(2025, 2), 200.0),
            invalid,
        ];
        let stats = vec![AggregatedStat {
            legal_name: "ADM LIFE".to_string(),
            region_code: "SP".to_string(),
            total_expense: 350.0,
            quarterly_mean: 175.0,
            quarterly_deviation: 35.36,
        }];
        load_run(&mut conn, &operators, &records, &stats).expect("load succeeds");
        conn
    }

    #[test]
    fn load_reports_row_counts() {
        let mut conn = open_in_memory().expect("store opens");
        let summary = load_run(
            &mut conn,
            &[operator("344800", "00366982000130", "ADM LIFE", "SP")],
            &[expense("344800", Period::new(2025, 1), 10.0)],
            &[],
        )
        .expect("load succeeds");
        assert_eq!(
            summary,
            LoadSummary { operators: 1, expenses: 1, aggregates: 0 }
        );
    }

    #[test]
    fn reload_replaces_previous_run() {
        let mut conn = seeded();
        load_run(
            &mut conn,
            &[operator("344800", "00366982000130", "ADM LIFE", "SP")],
            &[expense("344800", Period::new(2025, 3), 1.0)],
            &[],
        )
        .expect("second load");

        let operators = list_operators(&conn).expect("list");
        assert_eq!(operators.len(), 1);
        let expenses = expenses_for_operator(&conn, "00366982000130").expect("expenses");
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].trimestre, 3);
    }

    #[test]
    fn lists_operators_sorted_by_name() {
        let conn = seeded();
        let operators = list_operators(&conn).expect("list");
        assert_eq!(operators.len(), 2);
        assert_eq!(operators[0].razao_social, "ADM LIFE");
        assert_eq!(operators[1].uf.as_deref(), Some("RJ"));
    }

    #[test]
    fn finds_operator_by_cnpj() {
        let conn = seeded();
        let found = operator_by_cnpj(&conn, "00366982000130").expect("query");
        assert_eq!(found.expect("present").registro_ans, "344800");
        assert!(operator_by_cnpj(&conn, "00000000000000")
            .expect("query")
            .is_none());
    }

    #[test]
    fn expense_history_orders_by_period() {
        let conn = seeded();
        let expenses = expenses_for_operator(&conn, "00366982000130").expect("expenses");
        assert_eq!(expenses.len(), 3);
        assert_eq!(expenses[0].trimestre, 1);
        assert_eq!(expenses[2].trimestre, 2);
        assert_eq!(expenses[2].status_validacao, "Valid");
    }

    #[test]
    fn chart_series_sums_within_quarters() {
        let conn = seeded();
        let series = quarterly_totals(&conn, "00366982000130").expect("series");
        assert_eq!(
            series,
            vec![
                QuarterlyTotal { ano: 2025, trimestre: 1, total: 150.0 },
                QuarterlyTotal { ano: 2025, trimestre: 2, total: 200.0 },
            ]
        );
    }

    #[test]
    fn statistics_cover_all_loaded_expense_rows() {
        let conn = seeded();
        let stats = statistics(&conn).expect("statistics");
        assert_eq!(stats.total_geral, 345.0);
        assert_eq!(stats.media_geral, 86.25);
        assert_eq!(stats.top_operadoras[0].razao_social, "ADM LIFE");
        assert_eq!(stats.top_operadoras[0].total, 350.0);
        assert_eq!(stats.top_operadoras[1].total, -5.0);
        assert_eq!(stats.distribuicao_uf.len(), 2);
        assert_eq!(stats.distribuicao_uf[0].uf.as_deref(), Some("RJ"));
    }

    #[test]
    fn statistics_on_empty_store_are_zero() {
        let conn = open_in_memory().expect("store opens");
        let stats = statistics(&conn).expect("statistics");
        assert_eq!(stats.total_geral, 0.0);
        assert_eq!(stats.media_geral, 0.0);
        assert!(stats.top_operadoras.is_empty());
        assert!(stats.distribuicao_uf.is_empty());
    }
}
