//! Canal entry building shared by the canal family of protocols.
//!
//! Canal consumers expect JDBC type codes (`sqlType`), MySQL type names
//! (`mysqlType`) and every value rendered as text. The rules below follow what
//! canal itself emits for a MySQL binlog so that existing adapters keep working.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::event::{ActionType, Column, ColumnValue, RowChangedEvent};
use crate::mysql::ColumnType;

/// JDBC `java.sql.Types` codes.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[repr(i32)]
pub enum JavaSqlType {
  Bit = -7,
  TinyInt = -6,
  SmallInt = 5,
  Integer = 4,
  BigInt = -5,
  Real = 7,
  Float = 6,
  Double = 8,
  Numeric = 2,
  Decimal = 3,
  Char = 1,
  Varchar = 12,
  LongVarchar = -1,
  Date = 91,
  Time = 92,
  Timestamp = 93,
  Binary = -2,
  Varbinary = -3,
  LongVarbinary = -4,
  Null = 0,
  Blob = 2004,
  Clob = 2005,
}

impl JavaSqlType {
  pub fn code(self) -> i32 {
    self as i32
  }

  // mysql-connector-j MysqlDefs.mysqlToJavaType, with JSON as LONGVARCHAR (connector 8.0).
  fn from_mysql_type(t: ColumnType) -> Self {
    match t {
      ColumnType::MYSQL_TYPE_NEWDECIMAL | ColumnType::MYSQL_TYPE_DECIMAL => JavaSqlType::Decimal,
      ColumnType::MYSQL_TYPE_TINY => JavaSqlType::TinyInt,
      ColumnType::MYSQL_TYPE_SHORT => JavaSqlType::SmallInt,
      ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => JavaSqlType::Integer,
      ColumnType::MYSQL_TYPE_FLOAT => JavaSqlType::Real,
      ColumnType::MYSQL_TYPE_DOUBLE => JavaSqlType::Double,
      ColumnType::MYSQL_TYPE_NULL => JavaSqlType::Null,
      ColumnType::MYSQL_TYPE_TIMESTAMP
      | ColumnType::MYSQL_TYPE_TIMESTAMP2
      | ColumnType::MYSQL_TYPE_DATETIME
      | ColumnType::MYSQL_TYPE_DATETIME2 => JavaSqlType::Timestamp,
      ColumnType::MYSQL_TYPE_LONGLONG => JavaSqlType::BigInt,
      ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE | ColumnType::MYSQL_TYPE_YEAR => JavaSqlType::Date,
      ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => JavaSqlType::Time,
      ColumnType::MYSQL_TYPE_ENUM | ColumnType::MYSQL_TYPE_SET | ColumnType::MYSQL_TYPE_STRING => JavaSqlType::Char,
      ColumnType::MYSQL_TYPE_TINY_BLOB => JavaSqlType::Varbinary,
      ColumnType::MYSQL_TYPE_MEDIUM_BLOB | ColumnType::MYSQL_TYPE_LONG_BLOB | ColumnType::MYSQL_TYPE_BLOB => {
        JavaSqlType::LongVarbinary
      }
      ColumnType::MYSQL_TYPE_VAR_STRING | ColumnType::MYSQL_TYPE_VARCHAR => JavaSqlType::Varchar,
      ColumnType::MYSQL_TYPE_JSON => JavaSqlType::LongVarchar,
      ColumnType::MYSQL_TYPE_GEOMETRY => JavaSqlType::Binary,
      ColumnType::MYSQL_TYPE_BIT => JavaSqlType::Bit,
    }
  }

  /// JDBC type reported for a column before looking at its value.
  pub fn for_column(column: &Column) -> Self {
    // The unsigned flag is not reliable upstream, so integers are always
    // promoted to the next wider type: an unsigned tinyint (0..=255) does not
    // fit TINYINT.
    let sql_type = match column.column_type {
      ColumnType::MYSQL_TYPE_TINY => JavaSqlType::SmallInt,
      ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_INT24 => JavaSqlType::Integer,
      ColumnType::MYSQL_TYPE_LONG => JavaSqlType::BigInt,
      ColumnType::MYSQL_TYPE_LONGLONG => JavaSqlType::Decimal,
      t => JavaSqlType::from_mysql_type(t),
    };

    match sql_type {
      JavaSqlType::Binary | JavaSqlType::Varbinary | JavaSqlType::LongVarbinary => {
        if column.flags.is_binary() {
          JavaSqlType::Blob
        } else {
          // text columns are VARCHAR in jdbc
          JavaSqlType::Varchar
        }
      }
      t => t,
    }
  }
}

/// Canal row event type, or DDL event type.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum EventType {
  Insert,
  Update,
  Delete,
  Create,
  Alter,
  Erase,
  Query,
  Truncate,
  Rename,
  CIndex,
  DIndex,
}

impl EventType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EventType::Insert => "INSERT",
      EventType::Update => "UPDATE",
      EventType::Delete => "DELETE",
      EventType::Create => "CREATE",
      EventType::Alter => "ALTER",
      EventType::Erase => "ERASE",
      EventType::Query => "QUERY",
      EventType::Truncate => "TRUNCATE",
      EventType::Rename => "RENAME",
      EventType::CIndex => "CINDEX",
      EventType::DIndex => "DINDEX",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    let t = match s {
      "INSERT" => EventType::Insert,
      "UPDATE" => EventType::Update,
      "DELETE" => EventType::Delete,
      "CREATE" => EventType::Create,
      "ALTER" => EventType::Alter,
      "ERASE" => EventType::Erase,
      "QUERY" => EventType::Query,
      "TRUNCATE" => EventType::Truncate,
      "RENAME" => EventType::Rename,
      "CINDEX" => EventType::CIndex,
      "DINDEX" => EventType::DIndex,
      _ => return None,
    };
    Some(t)
  }

  pub fn for_row(e: &RowChangedEvent) -> Self {
    if e.is_delete() {
      EventType::Delete
    } else if e.is_update() {
      EventType::Update
    } else {
      EventType::Insert
    }
  }

  pub fn for_ddl(action: ActionType) -> Self {
    match action {
      ActionType::CreateTable => EventType::Create,
      ActionType::RenameTable => EventType::Rename,
      ActionType::AddIndex | ActionType::AddForeignKey | ActionType::AddPrimaryKey => EventType::CIndex,
      ActionType::DropIndex | ActionType::DropForeignKey | ActionType::DropPrimaryKey => EventType::DIndex,
      ActionType::AddColumn
      | ActionType::DropColumn
      | ActionType::ModifyColumn
      | ActionType::RebaseAutoId
      | ActionType::SetDefaultValue
      | ActionType::ModifyTableComment
      | ActionType::RenameIndex
      | ActionType::AddTablePartition
      | ActionType::DropTablePartition
      | ActionType::ModifyTableCharsetAndCollate
      | ActionType::TruncateTablePartition
      | ActionType::AddColumns
      | ActionType::DropColumns => EventType::Alter,
      ActionType::DropTable => EventType::Erase,
      ActionType::TruncateTable => EventType::Truncate,
      _ => EventType::Query,
    }
  }

  /// Best effort reverse of [`EventType::for_ddl`]. `ALTER` and `QUERY` cover
  /// many actions, so the statement text decides the schema and view cases.
  pub fn to_action(self, query: &str) -> ActionType {
    match self {
      EventType::Create => ActionType::CreateTable,
      EventType::Rename => ActionType::RenameTable,
      EventType::CIndex => ActionType::AddIndex,
      EventType::DIndex => ActionType::DropIndex,
      EventType::Erase => ActionType::DropTable,
      EventType::Truncate => ActionType::TruncateTable,
      _ => action_from_query(query),
    }
  }
}

fn action_from_query(query: &str) -> ActionType {
  let words = query
    .split_whitespace()
    .take(2)
    .map(str::to_ascii_uppercase)
    .collect::<Vec<_>>();
  match words.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
    ["CREATE", "DATABASE" | "SCHEMA"] => ActionType::CreateSchema,
    ["DROP", "DATABASE" | "SCHEMA"] => ActionType::DropSchema,
    ["CREATE", "VIEW"] => ActionType::CreateView,
    ["DROP", "VIEW"] => ActionType::DropView,
    _ => ActionType::None,
  }
}

/// Physical milliseconds of a TSO timestamp.
pub fn physical_ms(ts: u64) -> i64 {
  (ts >> 18) as i64
}

/// One byte per char (ISO-8859-1). Never fails; every byte has a code point.
pub fn latin1_decode(bytes: &[u8]) -> String {
  bytes.iter().map(|&b| b as char).collect()
}

/// Inverse of [`latin1_decode`].
pub fn latin1_encode(s: &str) -> Result<Vec<u8>> {
  s.chars()
    .map(|c| u8::try_from(u32::from(c)).map_err(|_| Error::decode(format!("{:?} is not a latin1 character", c))))
    .collect()
}

/// `mysqlType` as printed by canal, e.g. `int unsigned`, `varbinary`, `blob`.
pub fn mysql_type_name(column: &Column) -> String {
  let mut name = column.column_type.type_name().to_string();
  if column.flags.is_unsigned() && name != "bit" && name != "year" {
    name.push_str(" unsigned");
  }

  if !column.flags.is_binary() {
    return name;
  }

  if column.column_type.is_blob() {
    return name.replacen("text", "blob", 1);
  }

  if column.column_type.is_char() {
    return name.replacen("char", "binary", 1);
  }

  name
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanalColumn {
  pub name: String,
  pub sql_type: JavaSqlType,
  pub mysql_type: String,
  pub is_key: bool,
  /// `None` for SQL NULL.
  pub value: Option<String>,
}

#[derive(Debug, Default)]
pub struct RowData {
  pub before: Option<Vec<CanalColumn>>,
  pub after: Option<Vec<CanalColumn>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EntryBuilder;

impl EntryBuilder {
  pub fn new() -> Self {
    Self
  }

  pub fn build_column(&self, column: &Column) -> Result<CanalColumn> {
    let mut sql_type = JavaSqlType::for_column(column);

    let value = match &column.value {
      ColumnValue::Null => None,
      ColumnValue::Signed(v) => Some(v.to_string()),
      ColumnValue::Unsigned(v) => Some(v.to_string()),
      ColumnValue::Float(v) if !v.is_finite() => {
        return Err(Error::encode(format!(
          "column {} holds {} which has no decimal representation",
          column.name, v
        )))
      }
      ColumnValue::Float(v) if column.column_type == ColumnType::MYSQL_TYPE_FLOAT => Some((*v as f32).to_string()),
      ColumnValue::Float(v) => Some(v.to_string()),
      ColumnValue::Text(v) => Some(v.clone()),
      ColumnValue::Bytes(v) => match sql_type {
        JavaSqlType::Varchar | JavaSqlType::Char => Some(String::from_utf8_lossy(v).into_owned()),
        _ => {
          sql_type = JavaSqlType::Blob;
          Some(latin1_decode(v))
        }
      },
    };

    Ok(CanalColumn {
      name: column.name.clone(),
      sql_type,
      mysql_type: mysql_type_name(column),
      is_key: column.flags.is_primary_key(),
      value,
    })
  }

  fn build_columns(&self, columns: &[Column]) -> Result<Vec<CanalColumn>> {
    let mut seen = HashSet::with_capacity(columns.len());
    columns
      .iter()
      .map(|c| {
        if !seen.insert(c.name.as_str()) {
          return Err(Error::encode(format!("duplicate column {}", c.name)));
        }
        self.build_column(c)
      })
      .collect()
  }

  pub fn build_row_data(&self, e: &RowChangedEvent) -> Result<RowData> {
    let before = e.pre_columns.as_deref().map(|c| self.build_columns(c)).transpose()?;
    let after = e.columns.as_deref().map(|c| self.build_columns(c)).transpose()?;
    Ok(RowData { before, after })
  }
}
