//! Schema introspection
//!
//! Column names differ between deployments, so each handler resolves the
//! columns it needs at query time. Every table is described once by a
//! [`TableSpec`]: an ordered list of role rules. For each column (in ordinal
//! order) the first rule with a matching matcher claims it; a later column
//! matching the same role replaces the earlier one.

use std::collections::HashMap;

use leia_core::{ColumnInfo, LeiaError, Result, SqlExecutor};
use serde::Serialize;

/// Semantic meaning of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Supplier,
    Operator,
    LicenseStatus,
    LineCount,
    ReferenceMonth,
    ContractType,
    UserName,
    Cost,
    LineNumber,
    LineStatus,
    LineAccount,
    NumberType,
    LineType,
    HasTerm,
    TermStatus,
    TermType,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Supplier => "supplier",
            Self::Operator => "operator",
            Self::LicenseStatus => "license_status",
            Self::LineCount => "line_count",
            Self::ReferenceMonth => "reference_month",
            Self::ContractType => "contract_type",
            Self::UserName => "user_name",
            Self::Cost => "cost",
            Self::LineNumber => "line_number",
            Self::LineStatus => "line_status",
            Self::LineAccount => "line_account",
            Self::NumberType => "number_type",
            Self::LineType => "line_type",
            Self::HasTerm => "has_term",
            Self::TermStatus => "term_status",
            Self::TermType => "term_type",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One way a column can qualify for a role
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Lower-cased column name contains the fragment
    Name(&'static str),
    /// Lower-cased column name contains every fragment
    NameAll(&'static [&'static str]),
    /// SQL type equals the given name
    TypeIs(&'static str),
    /// SQL type contains the fragment
    TypeLike(&'static str),
}

impl Matcher {
    fn matches(&self, name: &str, data_type: &str) -> bool {
        match self {
            Matcher::Name(fragment) => name.contains(fragment),
            Matcher::NameAll(fragments) => fragments.iter().all(|f| name.contains(f)),
            Matcher::TypeIs(ty) => data_type == *ty,
            Matcher::TypeLike(fragment) => data_type.contains(fragment),
        }
    }
}

/// A role and the matchers (any of which) that select its column
#[derive(Debug, Clone, Copy)]
pub struct RoleRule {
    pub role: Role,
    pub matchers: &'static [Matcher],
}

/// Static description of a business table
#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    /// Portuguese subject used in user-facing error messages
    pub subject: &'static str,
    pub rules: &'static [RoleRule],
}

const fn rule(role: Role, matchers: &'static [Matcher]) -> RoleRule {
    RoleRule { role, matchers }
}

const CLIENT: RoleRule = rule(Role::Client, &[Matcher::Name("cliente")]);

const REFERENCE_MONTH: RoleRule = rule(
    Role::ReferenceMonth,
    &[
        Matcher::Name("mes"),
        Matcher::Name("referencia"),
        Matcher::Name("data"),
    ],
);

const CONTRACT_TYPE: RoleRule = rule(Role::ContractType, &[Matcher::NameAll(&["tipo", "contrato"])]);

pub static LINES: TableSpec = TableSpec {
    name: "ia_linhas",
    subject: "linhas",
    rules: &[
        CLIENT,
        rule(Role::LicenseStatus, &[Matcher::NameAll(&["status", "licenca"])]),
        rule(Role::Supplier, &[Matcher::Name("fornecedor")]),
        rule(
            Role::LineCount,
            &[Matcher::Name("total_linhas"), Matcher::NameAll(&["total", "linha"])],
        ),
        REFERENCE_MONTH,
        CONTRACT_TYPE,
    ],
};

pub static IDLE_LINES: TableSpec = TableSpec {
    name: "ia_linhas_ociosas",
    subject: "linhas ociosas",
    rules: &[
        CLIENT,
        rule(
            Role::Operator,
            &[Matcher::Name("operadora"), Matcher::Name("fornecedor")],
        ),
        REFERENCE_MONTH,
    ],
};

pub static USER_COSTS: TableSpec = TableSpec {
    name: "ia_custo_usuarios_linhas",
    subject: "custos por usuários",
    rules: &[
        CLIENT,
        rule(
            Role::UserName,
            &[Matcher::Name("nome_usuario"), Matcher::Name("usuario")],
        ),
        rule(Role::Operator, &[Matcher::Name("operadora")]),
        rule(
            Role::Cost,
            &[
                Matcher::Name("total"),
                Matcher::Name("custo"),
                Matcher::Name("valor"),
            ],
        ),
        REFERENCE_MONTH,
    ],
};

pub static TERMS: TableSpec = TableSpec {
    name: "ia_termos_numeros",
    subject: "termos",
    rules: &[
        CLIENT,
        // before line number, which would otherwise claim "tipo_numero"
        rule(Role::NumberType, &[Matcher::Name("tipo_numero")]),
        rule(
            Role::LineNumber,
            &[Matcher::Name("numero_linha"), Matcher::Name("numero")],
        ),
        rule(Role::LineStatus, &[Matcher::Name("status_linha")]),
        rule(Role::LineAccount, &[Matcher::Name("conta_linha")]),
        rule(Role::LineType, &[Matcher::Name("tipo_linha")]),
        rule(Role::HasTerm, &[Matcher::Name("possui_termo")]),
        rule(Role::TermStatus, &[Matcher::Name("status_termo")]),
        rule(Role::TermType, &[Matcher::Name("tipo_termo")]),
        rule(Role::UserName, &[Matcher::Name("nome_usuario")]),
    ],
};

pub static SUPPLIER_COSTS: TableSpec = TableSpec {
    name: "ia_custo_fornecedor",
    subject: "custos por fornecedor",
    rules: &[
        CLIENT,
        rule(Role::Supplier, &[Matcher::Name("fornecedor")]),
        rule(
            Role::Cost,
            &[
                Matcher::Name("custo"),
                Matcher::Name("valor"),
                Matcher::Name("total"),
                Matcher::TypeIs("numeric"),
                Matcher::TypeIs("decimal"),
                Matcher::TypeIs("money"),
                Matcher::TypeIs("double precision"),
            ],
        ),
        rule(
            Role::ReferenceMonth,
            &[
                Matcher::Name("mes"),
                Matcher::Name("referencia"),
                Matcher::Name("data"),
                Matcher::TypeIs("date"),
                Matcher::TypeLike("timestamp"),
            ],
        ),
        CONTRACT_TYPE,
    ],
};

/// Columns of one table resolved to roles
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub table: &'static str,
    columns: HashMap<Role, ColumnInfo>,
}

impl ResolvedSchema {
    /// Column for a role the caller cannot do without
    pub fn column(&self, role: Role) -> Result<&ColumnInfo> {
        self.columns
            .get(&role)
            .ok_or_else(|| LeiaError::UnmappedColumn {
                table: self.table.to_string(),
                role: role.to_string(),
            })
    }

    /// Column for an optional role
    pub fn get(&self, role: Role) -> Option<&ColumnInfo> {
        self.columns.get(&role)
    }
}

/// Assign columns to roles using the table's rules
pub fn map_columns(spec: &'static TableSpec, columns: &[ColumnInfo]) -> ResolvedSchema {
    let mut resolved = HashMap::new();

    for column in columns {
        let name = column.name.to_lowercase();
        let data_type = column.data_type.to_lowercase();

        let claimed = spec
            .rules
            .iter()
            .find(|rule| rule.matchers.iter().any(|m| m.matches(&name, &data_type)));

        if let Some(rule) = claimed {
            resolved.insert(rule.role, column.clone());
        }
    }

    ResolvedSchema {
        table: spec.name,
        columns: resolved,
    }
}

/// Check the table exists and resolve its columns
pub async fn introspect(db: &dyn SqlExecutor, spec: &'static TableSpec) -> Result<ResolvedSchema> {
    if !db.table_exists(spec.name).await? {
        return Err(LeiaError::TableNotFound {
            table: spec.name.to_string(),
        });
    }

    let columns = db.columns(spec.name).await?;
    let schema = map_columns(spec, &columns);
    tracing::debug!(
        table = spec.name,
        columns = columns.len(),
        resolved = schema.columns.len(),
        "Resolved table schema"
    );
    Ok(schema)
}
