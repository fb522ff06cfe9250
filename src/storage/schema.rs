//! Layout of the `acessos` table.
//!
//! Source columns keep the input header names; derived columns use the
//! matching Portuguese labels so the table reads as one sheet.

use rusqlite::Connection;

/// Name of the single output table.
pub const ACCESS_TABLE: &str = "acessos";

/// Drop any previous `acessos` table and create an empty one.
pub fn recreate_access_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"DROP TABLE IF EXISTS acessos;

        CREATE TABLE acessos (
            "Data e Hora" TEXT NOT NULL,
            "Tipo de Evento" TEXT NOT NULL,
            "Status" TEXT NOT NULL,
            "Usuário/Veículo" TEXT NOT NULL,
            "Observações" TEXT,
            "Tempo de Resposta (segundos)" INTEGER NOT NULL,
            "Hora" INTEGER NOT NULL,
            "Minuto" INTEGER NOT NULL,
            "Tipo de Usuário" TEXT NOT NULL,
            "Anomalia" TEXT NOT NULL,
            "Classificação" TEXT NOT NULL
        );"#,
    )
}

pub(crate) const INSERT_ACCESS: &str = r#"INSERT INTO acessos (
        "Data e Hora", "Tipo de Evento", "Status", "Usuário/Veículo", "Observações",
        "Tempo de Resposta (segundos)", "Hora", "Minuto", "Tipo de Usuário",
        "Anomalia", "Classificação"
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#;

pub(crate) const SELECT_ACCESS: &str = r#"SELECT
        "Data e Hora", "Tipo de Evento", "Status", "Usuário/Veículo", "Observações",
        "Tempo de Resposta (segundos)", "Hora", "Minuto", "Tipo de Usuário",
        "Anomalia", "Classificação"
    FROM acessos ORDER BY rowid"#;
