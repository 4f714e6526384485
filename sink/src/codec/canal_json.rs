//! canal-json: canal's flat message format.
//!
//! Every row, DDL and (with the TiDB extension) watermark is one JSON object:
//!
//! ```json
//! {"id":0,"database":"cdc","table":"person","pkNames":["id"],"isDdl":false,
//!  "type":"UPDATE","es":1591943372224,"ts":1469579899,"sql":"",
//!  "sqlType":{...},"mysqlType":{...},"data":[{...}],"old":[{...}],
//!  "_tidb":{"commitTs":417318403368288260}}
//! ```
//!
//! Field order and presence are fixed, consumers (canal adapter, flink) rely
//! on them. Maps are written with sorted keys.

use std::collections::{BTreeMap, HashSet, VecDeque};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::canal::{latin1_encode, physical_ms, CanalColumn, EntryBuilder, EventType, JavaSqlType};
use super::{EncoderResult, EventBatchDecoder, EventBatchEncoder, Protocol};
use crate::error::{Error, Result};
use crate::event::{
  Column, ColumnValue, DdlEvent, Message, MessageType, RowChangedEvent, SimpleTableInfo, TableName,
};
use crate::metrics::{EncoderMetrics, ProtocolMetrics};
use crate::mysql::{ColumnFlags, ColumnType};

const ENABLE_TIDB_EXTENSION: &str = "enable-tidb-extension";
const TIDB_WATERMARK_TYPE: &str = "TIDB_WATERMARK";

type ColumnMap = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TidbExtension {
  #[serde(skip_serializing_if = "is_zero")]
  commit_ts: u64,
  #[serde(skip_serializing_if = "is_zero")]
  watermark_ts: u64,
}

fn is_zero(v: &u64) -> bool {
  *v == 0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FlatMessage {
  // ignored by both canal adapter and flink
  id: i64,
  database: String,
  table: String,
  pk_names: Option<Vec<String>>,
  is_ddl: bool,
  #[serde(rename = "type")]
  event_type: String,
  es: i64,
  ts: i64,
  sql: String,
  sql_type: Option<BTreeMap<String, i32>>,
  mysql_type: Option<BTreeMap<String, String>>,
  data: Option<Vec<Option<ColumnMap>>>,
  old: Option<Vec<Option<ColumnMap>>>,
  #[serde(rename = "_tidb", skip_serializing_if = "Option::is_none")]
  tidb: Option<TidbExtension>,
  #[serde(skip)]
  commit_ts: u64,
}

impl FlatMessage {
  fn message_type(&self) -> MessageType {
    if self.is_ddl {
      MessageType::Ddl
    } else if self.event_type == TIDB_WATERMARK_TYPE {
      MessageType::Resolved
    } else {
      MessageType::Row
    }
  }

  fn commit_ts_extension(&self) -> u64 {
    self.tidb.map(|e| e.commit_ts).unwrap_or(0)
  }
}

fn build_time_ms() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

fn column_map(columns: &[CanalColumn]) -> ColumnMap {
  columns.iter().map(|c| (c.name.clone(), c.value.clone())).collect()
}

pub fn new_encoder(metrics: &EncoderMetrics) -> Box<dyn EventBatchEncoder> {
  Box::new(CanalJsonEncoder::new(metrics))
}

pub fn new_decoder(values: Vec<Bytes>, enable_tidb_extension: bool) -> Box<dyn EventBatchDecoder> {
  Box::new(CanalJsonDecoder::new(values, enable_tidb_extension))
}

pub struct CanalJsonEncoder {
  builder: EntryBuilder,
  enable_tidb_extension: bool,
  params_applied: bool,
  appended: bool,
  // commit_ts > last resolved ts, in arrival order
  unresolved_buf: VecDeque<FlatMessage>,
  // covered by the last resolved ts, waiting for build
  resolved_buf: Vec<FlatMessage>,
  metrics: ProtocolMetrics,
}

impl CanalJsonEncoder {
  pub fn new(metrics: &EncoderMetrics) -> Self {
    Self {
      builder: EntryBuilder::new(),
      enable_tidb_extension: false,
      params_applied: false,
      appended: false,
      unresolved_buf: VecDeque::new(),
      resolved_buf: Vec::new(),
      metrics: metrics.for_protocol(Protocol::CanalJson),
    }
  }

  pub fn enable_tidb_extension(&self) -> bool {
    self.enable_tidb_extension
  }

  pub fn unresolved_len(&self) -> usize {
    self.unresolved_buf.len()
  }

  pub fn resolved_len(&self) -> usize {
    self.resolved_buf.len()
  }

  fn with_extension(&self, mut msg: FlatMessage, extension: TidbExtension) -> FlatMessage {
    if self.enable_tidb_extension {
      msg.tidb = Some(extension);
    }
    msg
  }

  fn flat_message_for_dml(&self, e: &RowChangedEvent) -> Result<FlatMessage> {
    let event_type = EventType::for_row(e);
    let row = self.builder.build_row_data(e)?;

    // Types are described by the side that carries the row: the pre-image for
    // deletes, the post-image otherwise.
    let non_trivial_row = if e.is_delete() { &row.before } else { &row.after };
    let non_trivial_row = non_trivial_row.as_deref().unwrap_or_default();

    let sql_type = non_trivial_row
      .iter()
      .map(|c| (c.name.clone(), c.sql_type.code()))
      .collect();
    let mysql_type = non_trivial_row
      .iter()
      .map(|c| (c.name.clone(), c.mysql_type.clone()))
      .collect();
    let pk_names = e.primary_key_columns().map(|c| c.name.clone()).collect();

    let old_data = row.before.as_deref().map(column_map);
    let data = row.after.as_deref().map(column_map);

    // data and old always hold exactly one element, possibly null; canal
    // adapter breaks otherwise.
    let (data, old) = if e.is_delete() {
      (vec![old_data], None)
    } else if e.is_update() {
      (vec![data], Some(vec![old_data]))
    } else {
      (vec![data], None)
    };

    let msg = FlatMessage {
      id: 0,
      database: e.table.schema.clone(),
      table: e.table.table.clone(),
      pk_names: Some(pk_names),
      is_ddl: false,
      event_type: event_type.as_str().to_string(),
      es: physical_ms(e.commit_ts),
      ts: build_time_ms(),
      sql: String::new(),
      sql_type: Some(sql_type),
      mysql_type: Some(mysql_type),
      data: Some(data),
      old,
      tidb: None,
      commit_ts: e.commit_ts,
    };

    Ok(self.with_extension(
      msg,
      TidbExtension {
        commit_ts: e.commit_ts,
        ..Default::default()
      },
    ))
  }

  fn flat_message_for_ddl(&self, e: &DdlEvent) -> FlatMessage {
    let msg = FlatMessage {
      id: 0,
      database: e.table_info.schema.clone(),
      table: e.table_info.table.clone(),
      is_ddl: true,
      event_type: EventType::for_ddl(e.action).as_str().to_string(),
      es: physical_ms(e.commit_ts),
      ts: build_time_ms(),
      sql: e.query.clone(),
      commit_ts: e.commit_ts,
      ..Default::default()
    };

    self.with_extension(
      msg,
      TidbExtension {
        commit_ts: e.commit_ts,
        ..Default::default()
      },
    )
  }

  fn flat_message_for_checkpoint(&self, ts: u64) -> FlatMessage {
    FlatMessage {
      id: 0,
      is_ddl: false,
      event_type: TIDB_WATERMARK_TYPE.to_string(),
      es: physical_ms(ts),
      ts: build_time_ms(),
      tidb: Some(TidbExtension {
        watermark_ts: ts,
        ..Default::default()
      }),
      commit_ts: ts,
      ..Default::default()
    }
  }
}

fn to_json(msg: &FlatMessage) -> Result<Bytes> {
  serde_json::to_vec(msg)
    .map(Bytes::from)
    .map_err(|e| Error::encode(format!("canal-json marshal failed: {}", e)))
}

impl EventBatchEncoder for CanalJsonEncoder {
  fn set_params(&mut self, params: &BTreeMap<String, String>) -> Result<()> {
    if self.params_applied || self.appended {
      return Err(Error::config("params must be set once, before the first event"));
    }

    let mut enable_tidb_extension = self.enable_tidb_extension;
    for (key, value) in params {
      match key.as_str() {
        ENABLE_TIDB_EXTENSION => {
          enable_tidb_extension = value.parse().map_err(|_| {
            Error::config(format!("{} must be true or false, got {:?}", ENABLE_TIDB_EXTENSION, value))
          })?
        }
        unknown => return Err(Error::config(format!("unknown canal-json option {}", unknown))),
      }
    }

    self.enable_tidb_extension = enable_tidb_extension;
    self.params_applied = true;
    Ok(())
  }

  fn append_row_changed_event(&mut self, e: &RowChangedEvent) -> Result<EncoderResult> {
    let msg = self.flat_message_for_dml(e)?;
    self.unresolved_buf.push_back(msg);
    self.appended = true;
    self.metrics.appended_rows.inc();
    Ok(EncoderResult::NoOperation)
  }

  fn append_resolved_event(&mut self, ts: u64) -> Result<EncoderResult> {
    let ready = self
      .unresolved_buf
      .iter()
      .take_while(|msg| msg.commit_ts <= ts)
      .count();
    self.resolved_buf.extend(self.unresolved_buf.drain(..ready));

    debug!(
      resolved_ts = ts,
      moved = ready,
      pending = self.unresolved_buf.len(),
      "canal-json encoder resolved"
    );
    Ok(EncoderResult::NeedAsyncWrite)
  }

  fn build(&mut self) -> Result<Vec<Message>> {
    if self.resolved_buf.is_empty() {
      return Ok(Vec::new());
    }

    let messages = self
      .resolved_buf
      .iter()
      .map(|msg| -> Result<Message> {
        let mut m = Message::new(
          Protocol::CanalJson,
          Bytes::new(),
          to_json(msg)?,
          msg.commit_ts,
          MessageType::Row,
          Some(msg.database.clone()),
          Some(msg.table.clone()),
        );
        m.inc_rows_count();
        Ok(m)
      })
      .collect::<Result<Vec<_>>>()?;
    self.resolved_buf.clear();

    self.metrics.row_messages.inc_by(messages.len() as u64);
    self.metrics.batch_size.observe(messages.len() as f64);
    debug!(
      messages = messages.len(),
      bytes = messages.iter().map(Message::length).sum::<usize>(),
      "canal-json encoder built batch"
    );
    Ok(messages)
  }

  fn encode_ddl_event(&self, e: &DdlEvent) -> Result<Message> {
    let msg = self.flat_message_for_ddl(e);
    let value = to_json(&msg)?;
    self.metrics.ddl_messages.inc();
    Ok(Message::new_ddl(Protocol::CanalJson, Bytes::new(), value, e))
  }

  fn encode_checkpoint_event(&self, ts: u64) -> Result<Option<Message>> {
    // plain canal-json has no slot for a watermark
    if !self.enable_tidb_extension {
      return Ok(None);
    }

    let msg = self.flat_message_for_checkpoint(ts);
    let value = to_json(&msg)?;
    self.metrics.resolved_messages.inc();
    Ok(Some(Message::new_resolved(Protocol::CanalJson, Bytes::new(), value, ts)))
  }
}

/// Decodes a batch of canal-json message values.
///
/// `has_next` parses the head of the batch and keeps it until one of the
/// `next_*` calls consumes it. The `_tidb` block is only honoured when the
/// extension is enabled, otherwise commit timestamps read as zero and
/// watermarks cannot be consumed.
pub struct CanalJsonDecoder {
  values: VecDeque<Bytes>,
  msg: Option<FlatMessage>,
  enable_tidb_extension: bool,
}

impl CanalJsonDecoder {
  pub fn new(values: impl IntoIterator<Item = Bytes>, enable_tidb_extension: bool) -> Self {
    Self {
      values: values.into_iter().collect(),
      msg: None,
      enable_tidb_extension,
    }
  }

  pub fn from_messages<'a>(messages: impl IntoIterator<Item = &'a Message>, enable_tidb_extension: bool) -> Self {
    Self::new(messages.into_iter().map(|m| m.value.clone()), enable_tidb_extension)
  }

  fn take(&mut self, wanted: MessageType) -> Result<FlatMessage> {
    let (message_type, has_next) = self.has_next()?;
    if !has_next {
      return Err(Error::decode("no more canal-json messages"));
    }
    if message_type != wanted {
      return Err(Error::decode(format!(
        "next canal-json message is {:?}, not {:?}",
        message_type, wanted
      )));
    }
    self
      .msg
      .take()
      .ok_or_else(|| Error::decode("no more canal-json messages"))
  }
}

impl EventBatchDecoder for CanalJsonDecoder {
  fn has_next(&mut self) -> Result<(MessageType, bool)> {
    if let Some(msg) = &self.msg {
      return Ok((msg.message_type(), true));
    }

    let Some(value) = self.values.pop_front() else {
      return Ok((MessageType::Unknown, false));
    };

    let mut msg: FlatMessage = serde_json::from_slice(&value).map_err(|err| {
      warn!(error = %err, data = %String::from_utf8_lossy(&value), "canal-json decoder unmarshal data failed");
      Error::decode(format!("canal-json unmarshal failed: {}", err))
    })?;

    if !self.enable_tidb_extension {
      msg.tidb = None;
    }

    let message_type = msg.message_type();
    self.msg = Some(msg);
    Ok((message_type, true))
  }

  fn next_row_changed_event(&mut self) -> Result<RowChangedEvent> {
    let msg = self.take(MessageType::Row)?;
    row_changed_event(msg)
  }

  fn next_ddl_event(&mut self) -> Result<DdlEvent> {
    let msg = self.take(MessageType::Ddl)?;
    let commit_ts = msg.commit_ts_extension();
    let action = EventType::parse(&msg.event_type)
      .map(|t| t.to_action(&msg.sql))
      .unwrap_or_default();

    Ok(DdlEvent {
      start_ts: 0,
      commit_ts,
      table_info: SimpleTableInfo {
        schema: msg.database,
        table: msg.table,
      },
      action,
      query: msg.sql,
    })
  }

  fn next_resolved_event(&mut self) -> Result<u64> {
    if !self.enable_tidb_extension {
      // leave the message pending, a decoder with the extension could read it
      return Err(Error::decode("watermark messages need the tidb extension"));
    }
    let msg = self.take(MessageType::Resolved)?;
    match msg.tidb {
      Some(extension) => Ok(extension.watermark_ts),
      None => Err(Error::decode("watermark message has no _tidb block")),
    }
  }
}

fn row_changed_event(msg: FlatMessage) -> Result<RowChangedEvent> {
  let commit_ts = msg.commit_ts_extension();
  let event_type = EventType::parse(&msg.event_type)
    .ok_or_else(|| Error::decode(format!("unknown canal-json event type {:?}", msg.event_type)))?;

  let mysql_type = msg.mysql_type.unwrap_or_default();
  let sql_type = msg.sql_type.unwrap_or_default();
  let pk_names = msg.pk_names.unwrap_or_default();
  let pk_names = pk_names.iter().map(String::as_str).collect::<HashSet<_>>();

  let first = |rows: Option<Vec<Option<ColumnMap>>>| rows.into_iter().flatten().next().flatten().unwrap_or_default();
  let columns = |values: ColumnMap| columns_from_map(values, &mysql_type, &sql_type, &pk_names);

  let (post, pre) = match event_type {
    // a delete carries the removed row in `data`
    EventType::Delete => (None, Some(columns(first(msg.data))?)),
    EventType::Insert => (Some(columns(first(msg.data))?), None),
    EventType::Update => (Some(columns(first(msg.data))?), Some(columns(first(msg.old))?)),
    other => {
      return Err(Error::decode(format!(
        "{} is not a row event type",
        other.as_str()
      )))
    }
  };

  Ok(RowChangedEvent {
    start_ts: 0,
    commit_ts,
    table: TableName::new(msg.database, msg.table),
    columns: post,
    pre_columns: pre,
  })
}

fn columns_from_map(
  values: ColumnMap,
  mysql_type: &BTreeMap<String, String>,
  sql_type: &BTreeMap<String, i32>,
  pk_names: &HashSet<&str>,
) -> Result<Vec<Column>> {
  values
    .into_iter()
    .map(|(name, value)| {
      let type_name = mysql_type
        .get(&name)
        .ok_or_else(|| Error::decode(format!("mysql type of column {} not found", name)))?;
      let (base, unsigned) = match type_name.strip_suffix(" unsigned") {
        Some(base) => (base, true),
        None => (type_name.as_str(), false),
      };
      let (column_type, binary) = ColumnType::from_type_name(base)
        .ok_or_else(|| Error::decode(format!("unknown mysql type {} of column {}", type_name, name)))?;

      let mut flags = ColumnFlags::empty();
      flags.set(ColumnFlags::UNSIGNED, unsigned);
      flags.set(ColumnFlags::BINARY, binary);
      flags.set(ColumnFlags::PRIMARY_KEY, pk_names.contains(name.as_str()));

      let blob = sql_type.get(&name) == Some(&JavaSqlType::Blob.code());
      let value = match value {
        None => ColumnValue::Null,
        Some(v) => parse_value(&name, v, column_type, unsigned, binary, blob)?,
      };

      Ok(Column {
        name,
        column_type,
        flags,
        value,
      })
    })
    .collect()
}

fn parse_value(
  name: &str,
  v: String,
  column_type: ColumnType,
  unsigned: bool,
  binary: bool,
  blob: bool,
) -> Result<ColumnValue> {
  if blob {
    return Ok(ColumnValue::Bytes(latin1_encode(&v)?.into()));
  }

  let invalid = |err: &dyn std::fmt::Display| Error::decode(format!("column {}: {:?} is invalid: {}", name, v, err));

  if column_type.is_integer() || column_type == ColumnType::MYSQL_TYPE_BIT {
    return if unsigned || column_type == ColumnType::MYSQL_TYPE_BIT {
      v.parse().map(ColumnValue::Unsigned).map_err(|e| invalid(&e))
    } else {
      // the unsigned flag is not always set upstream
      v.parse()
        .map(ColumnValue::Signed)
        .or_else(|_| v.parse().map(ColumnValue::Unsigned))
        .map_err(|e| invalid(&e))
    };
  }

  if column_type.is_float() {
    return v.parse().map(ColumnValue::Float).map_err(|e| invalid(&e));
  }

  if binary {
    return Ok(ColumnValue::Bytes(Bytes::from(v.into_bytes())));
  }

  Ok(ColumnValue::Text(v))
}
