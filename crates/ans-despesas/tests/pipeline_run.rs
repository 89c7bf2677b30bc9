use ans_despesas::config::DataConfig;
use ans_despesas::pipeline::{self, store, PipelineError};
use ans_despesas::tabular::DecodePolicy;
use std::path::Path;

fn fixture_config(root: &Path) -> DataConfig {
    DataConfig {
        assets_dir: root.join("assets"),
        files_dir: root.join("files"),
        database_path: root.join("files").join("ans_despesas.db"),
        decode: DecodePolicy::default(),
    }
}

fn write_fixtures(data: &DataConfig) {
    std::fs::create_dir_all(&data.assets_dir).expect("assets dir");
    std::fs::create_dir_all(&data.files_dir).expect("files dir");

    // First quarter statement, UTF-8 with a BOM like the portal exports.
    std::fs::write(
        data.files_dir.join("1T2025.csv"),
        "\u{feff}DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_FINAL\n\
         2025-01-01;344800;411;EVENTOS/SINISTROS CONHECIDOS OU AVISADOS;1.000,00\n\
         2025-01-01;344800;311;CONTRAPRESTACOES EFETIVAS;9.999,99\n\
         2025-01-01;999999;411;SINISTROS AVISADOS;200,00\n",
    )
    .expect("first statement");

    std::fs::write(
        data.files_dir.join("2T2025.csv"),
        "DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_FINAL\n\
         2025-04-01;344800;411;EVENTOS/SINISTROS CONHECIDOS OU AVISADOS;3.000,00\n\
         2025-04-01;777777;411;EVENTOS;50,00\n",
    )
    .expect("second statement");

    // Registry report in Latin-1, exercising the fallback decode.
    std::fs::write(
        data.assets_dir.join("Relatorio_cadop.csv"),
        b"REGISTRO_OPERADORA;CNPJ;Razao_Social;Modalidade;UF\n\
          344800;00366982000130;ADM LIFE ADMINISTRADORA DE BENEF\xcdCIOS;Administradora;SP\n\
          999999;11222333000181;OUTRA OPERADORA;Cooperativa;RJ\n"
            .to_vec(),
    )
    .expect("registry report");
}

#[test]
fn full_run_consolidates_enriches_and_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = fixture_config(dir.path());
    write_fixtures(&data);

    let mut conn = store::open(&data.database_path).expect("store opens");
    let report = pipeline::run_all(&data, &mut conn).expect("pipeline runs");

    assert_eq!(report.consolidation.files_read, 2);
    assert_eq!(report.consolidation.records, 4);
    assert_eq!(report.enrichment.match_report.total, 4);
    assert_eq!(report.enrichment.match_report.matched, 3);
    assert_eq!(report.enrichment.match_report.unmatched, 1);
    assert_eq!(report.enrichment.valid, 3);
    assert_eq!(report.enrichment.invalid, 1);
    assert_eq!(report.enrichment.aggregated_groups, 2);
    assert_eq!(report.load.operators, 2);
    assert_eq!(report.load.expenses, 4);
    assert_eq!(report.load.aggregates, 2);

    let enriched =
        std::fs::read_to_string(data.enriched_report_path()).expect("enriched report exists");
    assert!(enriched.contains("Status_Validacao"));
    assert!(enriched.contains("ADM LIFE ADMINISTRADORA DE BENEF\u{cd}CIOS"));
    assert!(enriched.contains("Invalid: Missing Identifier, Empty Legal Name"));

    let aggregated =
        std::fs::read_to_string(data.aggregated_report_path()).expect("aggregated report exists");
    let mut lines = aggregated.lines();
    assert_eq!(
        lines.next(),
        Some("\u{feff}RazaoSocial;UF;TotalDespesas;MediaTrimestral;DesvioPadrao")
    );
    // Descending by total: ADM LIFE (4000.00) before OUTRA OPERADORA (200.00).
    assert_eq!(
        lines.next(),
        Some("ADM LIFE ADMINISTRADORA DE BENEF\u{cd}CIOS;SP;4000,00;2000,00;1414,21")
    );
    assert_eq!(lines.next(), Some("OUTRA OPERADORA;RJ;200,00;200,00;0,00"));

    let operator =
        store::operator_by_cnpj(&conn, "11222333000181").expect("query").expect("operator loaded");
    assert_eq!(operator.registro_ans, "999999");

    let series = store::quarterly_totals(&conn, "00366982000130").expect("chart series");
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].total, 1000.0);
    assert_eq!(series[1].total, 3000.0);

    let stats = store::statistics(&conn).expect("statistics");
    assert_eq!(stats.total_geral, 4250.0);
    assert_eq!(stats.top_operadoras[0].total, 4000.0);
}

#[test]
fn rerun_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = fixture_config(dir.path());
    write_fixtures(&data);

    let mut conn = store::open(&data.database_path).expect("store opens");
    let first = pipeline::run_all(&data, &mut conn).expect("first run");
    let second = pipeline::run_all(&data, &mut conn).expect("second run");

    assert_eq!(
        first.enrichment.match_report,
        second.enrichment.match_report
    );
    assert_eq!(first.load.expenses, second.load.expenses);

    // The store holds exactly one run's rows after the rerun.
    let stats = store::statistics(&conn).expect("statistics");
    assert_eq!(stats.total_geral, 4250.0);
}

#[test]
fn missing_statements_directory_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = fixture_config(dir.path());
    std::fs::create_dir_all(&data.assets_dir).expect("assets dir");

    let mut conn = store::open_in_memory().expect("store opens");
    let error = pipeline::run_all(&data, &mut conn).expect_err("nothing to consolidate");
    assert!(matches!(error, PipelineError::NoStatementFiles { .. }));
}
