use bytes::Bytes;

use crate::codec::Protocol;
use crate::mysql::{ColumnFlags, ColumnType};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableName {
  pub schema: String,
  pub table: String,
  pub table_id: i64,
}

impl TableName {
  pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
    Self {
      schema: schema.into(),
      table: table.into(),
      table_id: 0,
    }
  }
}

/// A single row mutation. `columns` is the post-image and `pre_columns` the
/// pre-image: an insert has no pre-image, a delete no post-image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowChangedEvent {
  pub start_ts: u64,
  pub commit_ts: u64,
  pub table: TableName,
  pub columns: Option<Vec<Column>>,
  pub pre_columns: Option<Vec<Column>>,
}

impl RowChangedEvent {
  pub fn is_insert(&self) -> bool {
    self.pre_columns.is_none() && self.columns.is_some()
  }

  pub fn is_update(&self) -> bool {
    self.pre_columns.is_some() && self.columns.is_some()
  }

  pub fn is_delete(&self) -> bool {
    self.columns.is_none() && self.pre_columns.is_some()
  }

  /// Primary key columns of the post-image, or of the pre-image for deletes.
  pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
    self
      .columns
      .as_ref()
      .or(self.pre_columns.as_ref())
      .into_iter()
      .flatten()
      .filter(|c| c.flags.is_primary_key())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
  pub name: String,
  pub column_type: ColumnType,
  pub flags: ColumnFlags,
  pub value: ColumnValue,
}

impl Column {
  pub fn new(name: impl Into<String>, column_type: ColumnType, value: ColumnValue) -> Self {
    Self {
      name: name.into(),
      column_type,
      flags: ColumnFlags::empty(),
      value,
    }
  }

  pub fn with_flags(mut self, flags: ColumnFlags) -> Self {
    self.flags = flags;
    self
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
  Null,
  Signed(i64),
  Unsigned(u64),
  Float(f64),
  Text(String),
  Bytes(Bytes),
}

impl From<i64> for ColumnValue {
  fn from(v: i64) -> Self {
    ColumnValue::Signed(v)
  }
}

impl From<u64> for ColumnValue {
  fn from(v: u64) -> Self {
    ColumnValue::Unsigned(v)
  }
}

impl From<f64> for ColumnValue {
  fn from(v: f64) -> Self {
    ColumnValue::Float(v)
  }
}

impl From<&str> for ColumnValue {
  fn from(v: &str) -> Self {
    ColumnValue::Text(v.to_string())
  }
}

impl From<String> for ColumnValue {
  fn from(v: String) -> Self {
    ColumnValue::Text(v)
  }
}

impl From<Bytes> for ColumnValue {
  fn from(v: Bytes) -> Self {
    ColumnValue::Bytes(v)
  }
}

impl From<&[u8]> for ColumnValue {
  fn from(v: &[u8]) -> Self {
    ColumnValue::Bytes(Bytes::copy_from_slice(v))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleTableInfo {
  pub schema: String,
  pub table: String,
}

/// A schema change. Acts as a barrier: it is delivered on its own, never
/// batched with the surrounding row events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdlEvent {
  pub start_ts: u64,
  pub commit_ts: u64,
  pub table_info: SimpleTableInfo,
  pub action: ActionType,
  pub query: String,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
#[repr(u8)]
pub enum ActionType {
  #[default]
  None = 0,
  CreateSchema = 1,
  DropSchema = 2,
  CreateTable = 3,
  DropTable = 4,
  AddColumn = 5,
  DropColumn = 6,
  AddIndex = 7,
  DropIndex = 8,
  AddForeignKey = 9,
  DropForeignKey = 10,
  TruncateTable = 11,
  ModifyColumn = 12,
  RebaseAutoId = 13,
  RenameTable = 14,
  SetDefaultValue = 15,
  ShardRowId = 16,
  ModifyTableComment = 17,
  RenameIndex = 18,
  AddTablePartition = 19,
  DropTablePartition = 20,
  CreateView = 21,
  ModifyTableCharsetAndCollate = 22,
  TruncateTablePartition = 23,
  DropView = 24,
  RecoverTable = 25,
  ModifySchemaCharsetAndCollate = 26,
  LockTable = 27,
  UnlockTable = 28,
  RepairTable = 29,
  SetTiFlashReplica = 30,
  UpdateTiFlashReplicaStatus = 31,
  AddPrimaryKey = 32,
  DropPrimaryKey = 33,
  CreateSequence = 34,
  AlterSequence = 35,
  DropSequence = 36,
  AddColumns = 37,
  DropColumns = 38,
  ModifyTableAutoIdCache = 39,
  RebaseAutoRandomBase = 40,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum MessageType {
  #[default]
  Unknown,
  Row,
  Ddl,
  Resolved,
}

/// Wire envelope handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
  pub key: Bytes,
  pub value: Bytes,
  pub partition: Option<i32>,
  pub ts: u64,
  pub schema: Option<String>,
  pub table: Option<String>,
  pub message_type: MessageType,
  pub protocol: Protocol,
  pub rows_count: usize,
}

impl Message {
  pub fn new(
    protocol: Protocol,
    key: Bytes,
    value: Bytes,
    ts: u64,
    message_type: MessageType,
    schema: Option<String>,
    table: Option<String>,
  ) -> Self {
    Self {
      key,
      value,
      partition: None,
      ts,
      schema,
      table,
      message_type,
      protocol,
      rows_count: 0,
    }
  }

  pub fn new_ddl(protocol: Protocol, key: Bytes, value: Bytes, event: &DdlEvent) -> Self {
    Self::new(
      protocol,
      key,
      value,
      event.commit_ts,
      MessageType::Ddl,
      Some(event.table_info.schema.clone()),
      Some(event.table_info.table.clone()),
    )
  }

  pub fn new_resolved(protocol: Protocol, key: Bytes, value: Bytes, ts: u64) -> Self {
    Self::new(protocol, key, value, ts, MessageType::Resolved, None, None)
  }

  /// Bytes this message occupies on the wire.
  pub fn length(&self) -> usize {
    self.key.len() + self.value.len()
  }

  pub fn inc_rows_count(&mut self) {
    self.rows_count += 1;
  }
}
