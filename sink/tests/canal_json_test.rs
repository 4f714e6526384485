use std::collections::BTreeMap;

use bytes::Bytes;
use prometheus::Registry;
use serde_json::{json, Value};
use sink::codec::canal_json::{CanalJsonDecoder, CanalJsonEncoder};
use sink::codec::{new_event_batch_decoder, new_event_batch_encoder, EncoderResult, EventBatchDecoder, EventBatchEncoder, Protocol};
use sink::event::{
  ActionType, Column, ColumnValue, DdlEvent, MessageType, RowChangedEvent, SimpleTableInfo, TableName,
};
use sink::metrics::EncoderMetrics;
use sink::mysql::{ColumnFlags, ColumnType};
use sink::options::SinkOptions;

const COMMIT_TS: u64 = 417318403368288260;

fn metrics() -> EncoderMetrics {
  EncoderMetrics::new(&Registry::new()).unwrap()
}

fn new_encoder(enable_tidb_extension: bool) -> CanalJsonEncoder {
  let mut encoder = CanalJsonEncoder::new(&metrics());
  let params = BTreeMap::from([(
    "enable-tidb-extension".to_string(),
    enable_tidb_extension.to_string(),
  )]);
  encoder.set_params(&params).unwrap();
  encoder
}

fn person(name: &str) -> Vec<Column> {
  vec![
    Column::new("id", ColumnType::MYSQL_TYPE_LONG, 1i64.into()).with_flags(ColumnFlags::PRIMARY_KEY | ColumnFlags::HANDLE_KEY),
    Column::new("name", ColumnType::MYSQL_TYPE_VARCHAR, name.into()),
    Column::new("tiny", ColumnType::MYSQL_TYPE_TINY, 255u64.into()).with_flags(ColumnFlags::UNSIGNED),
    Column::new("comment", ColumnType::MYSQL_TYPE_BLOB, Bytes::from("测试").into()),
    Column::new("blob", ColumnType::MYSQL_TYPE_BLOB, Bytes::from("测试blob").into()).with_flags(ColumnFlags::BINARY),
    Column::new("binaryString", ColumnType::MYSQL_TYPE_STRING, "Chengdu International Airport".into())
      .with_flags(ColumnFlags::BINARY),
    Column::new("binaryBlob", ColumnType::MYSQL_TYPE_VARCHAR, Bytes::from("你好，世界").into())
      .with_flags(ColumnFlags::BINARY),
  ]
}

fn update_event() -> RowChangedEvent {
  RowChangedEvent {
    commit_ts: COMMIT_TS,
    table: TableName::new("cdc", "person"),
    columns: Some(person("Bob")),
    pre_columns: Some(person("Alice")),
    ..Default::default()
  }
}

fn ddl_event() -> DdlEvent {
  DdlEvent {
    commit_ts: COMMIT_TS,
    table_info: SimpleTableInfo {
      schema: "cdc".to_string(),
      table: "person".to_string(),
    },
    action: ActionType::CreateTable,
    query: "create table person(id int, name varchar(32), tiny tinyint unsigned, comment text, primary key(id))"
      .to_string(),
    ..Default::default()
  }
}

/// What the decoder reads back for `person(name)`: columns sorted by name,
/// text columns come back as text and binary ones as bytes.
fn decoded_person(name: &str) -> Vec<Column> {
  vec![
    Column::new("binaryBlob", ColumnType::MYSQL_TYPE_VARCHAR, Bytes::from("你好，世界").into())
      .with_flags(ColumnFlags::BINARY),
    Column::new("binaryString", ColumnType::MYSQL_TYPE_STRING, Bytes::from("Chengdu International Airport").into())
      .with_flags(ColumnFlags::BINARY),
    Column::new("blob", ColumnType::MYSQL_TYPE_BLOB, Bytes::from("测试blob").into()).with_flags(ColumnFlags::BINARY),
    Column::new("comment", ColumnType::MYSQL_TYPE_BLOB, "测试".into()),
    Column::new("id", ColumnType::MYSQL_TYPE_LONG, 1i64.into()).with_flags(ColumnFlags::PRIMARY_KEY),
    Column::new("name", ColumnType::MYSQL_TYPE_VARCHAR, name.into()),
    Column::new("tiny", ColumnType::MYSQL_TYPE_TINY, 255u64.into()).with_flags(ColumnFlags::UNSIGNED),
  ]
}

fn encode_update(encoder: &mut CanalJsonEncoder) -> Bytes {
  encoder.append_row_changed_event(&update_event()).unwrap();
  encoder.append_resolved_event(COMMIT_TS).unwrap();
  let mut messages = encoder.build().unwrap();
  assert_eq!(1, messages.len());
  messages.remove(0).value
}

#[test]
fn test_update_message_layout() {
  let mut encoder = new_encoder(false);
  let value = encode_update(&mut encoder);

  let text = std::str::from_utf8(&value).unwrap();
  let keys = [
    "\"id\"", "\"database\"", "\"table\"", "\"pkNames\"", "\"isDdl\"", "\"type\"", "\"es\"", "\"ts\"", "\"sql\"",
    "\"sqlType\"", "\"mysqlType\"", "\"data\"", "\"old\"",
  ];
  let positions = keys.iter().map(|k| text.find(k).unwrap()).collect::<Vec<_>>();
  assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", text);

  let msg: Value = serde_json::from_slice(&value).unwrap();
  assert_eq!(json!(0), msg["id"]);
  assert_eq!(json!("cdc"), msg["database"]);
  assert_eq!(json!("person"), msg["table"]);
  assert_eq!(json!(["id"]), msg["pkNames"]);
  assert_eq!(json!(false), msg["isDdl"]);
  assert_eq!(json!("UPDATE"), msg["type"]);
  assert_eq!(json!(1591943372224i64), msg["es"]);
  assert_eq!(json!(""), msg["sql"]);
  assert!(msg.get("_tidb").is_none());

  assert_eq!(
    json!({
      "id": -5,
      "name": 12,
      "tiny": 5,
      "comment": 12,
      "blob": 2004,
      "binaryString": 1,
      "binaryBlob": 12,
    }),
    msg["sqlType"]
  );
  assert_eq!(
    json!({
      "id": "int",
      "name": "varchar",
      "tiny": "tinyint unsigned",
      "comment": "text",
      "blob": "blob",
      "binaryString": "binary",
      "binaryBlob": "varbinary",
    }),
    msg["mysqlType"]
  );

  let blob = "测试blob".as_bytes().iter().map(|&b| b as char).collect::<String>();
  let row = |name: &str| {
    json!([{
      "id": "1",
      "name": name,
      "tiny": "255",
      "comment": "测试",
      "blob": blob,
      "binaryString": "Chengdu International Airport",
      "binaryBlob": "你好，世界",
    }])
  };
  assert_eq!(row("Bob"), msg["data"]);
  assert_eq!(row("Alice"), msg["old"]);
}

#[test]
fn test_tidb_extension_commit_ts() {
  let mut encoder = new_encoder(true);
  let value = encode_update(&mut encoder);
  let msg: Value = serde_json::from_slice(&value).unwrap();
  assert_eq!(json!({ "commitTs": COMMIT_TS }), msg["_tidb"]);
}

#[test]
fn test_delete_message() {
  let mut encoder = new_encoder(false);
  let mut e = update_event();
  e.columns = None;
  encoder.append_row_changed_event(&e).unwrap();
  encoder.append_resolved_event(COMMIT_TS).unwrap();
  let messages = encoder.build().unwrap();

  let msg: Value = serde_json::from_slice(&messages[0].value).unwrap();
  assert_eq!(json!("DELETE"), msg["type"]);
  assert_eq!(json!("Alice"), msg["data"][0]["name"]);
  assert_eq!(Value::Null, msg["old"]);
  assert_eq!(json!(["id"]), msg["pkNames"]);
}

#[test]
fn test_round_trip() {
  for (encode_extension, decode_extension) in [(false, false), (false, true), (true, false), (true, true)] {
    let mut encoder = new_encoder(encode_extension);
    let value = encode_update(&mut encoder);

    let mut decoder = CanalJsonDecoder::new(vec![value], decode_extension);
    assert_eq!((MessageType::Row, true), decoder.has_next().unwrap());
    let row = decoder.next_row_changed_event().unwrap();

    let commit_ts = if encode_extension && decode_extension { COMMIT_TS } else { 0 };
    assert_eq!(commit_ts, row.commit_ts, "{} {}", encode_extension, decode_extension);
    assert_eq!(TableName::new("cdc", "person"), row.table);
    assert!(row.is_update());
    assert_eq!(Some(decoded_person("Bob")), row.columns);
    assert_eq!(Some(decoded_person("Alice")), row.pre_columns);

    assert_eq!((MessageType::Unknown, false), decoder.has_next().unwrap());
    assert!(decoder.next_row_changed_event().unwrap_err().is_decode());
    assert!(decoder.next_ddl_event().unwrap_err().is_decode());
  }
}

#[test]
fn test_ddl_round_trip() {
  for enable_tidb_extension in [false, true] {
    let encoder = new_encoder(enable_tidb_extension);
    let message = encoder.encode_ddl_event(&ddl_event()).unwrap();
    assert_eq!(MessageType::Ddl, message.message_type);
    assert_eq!(COMMIT_TS, message.ts);
    assert_eq!(Some("cdc"), message.schema.as_deref());

    let msg: Value = serde_json::from_slice(&message.value).unwrap();
    assert_eq!(json!(true), msg["isDdl"]);
    assert_eq!(json!("CREATE"), msg["type"]);
    assert_eq!(Value::Null, msg["pkNames"]);
    assert_eq!(Value::Null, msg["data"]);

    let mut decoder = CanalJsonDecoder::from_messages([&message], enable_tidb_extension);
    assert_eq!((MessageType::Ddl, true), decoder.has_next().unwrap());
    let ddl = decoder.next_ddl_event().unwrap();
    assert_eq!(ActionType::CreateTable, ddl.action);
    assert_eq!(ddl_event().query, ddl.query);
    assert_eq!(ddl_event().table_info, ddl.table_info);
    let commit_ts = if enable_tidb_extension { COMMIT_TS } else { 0 };
    assert_eq!(commit_ts, ddl.commit_ts);

    assert_eq!((MessageType::Unknown, false), decoder.has_next().unwrap());
    assert!(decoder.next_ddl_event().unwrap_err().is_decode());
    assert!(decoder.next_row_changed_event().unwrap_err().is_decode());
  }
}

#[test]
fn test_checkpoint_gating() {
  let encoder = new_encoder(false);
  assert!(encoder.encode_checkpoint_event(COMMIT_TS).unwrap().is_none());

  let encoder = new_encoder(true);
  let message = encoder.encode_checkpoint_event(COMMIT_TS).unwrap().unwrap();
  assert_eq!(MessageType::Resolved, message.message_type);
  assert_eq!(COMMIT_TS, message.ts);
  assert_eq!(None, message.schema);

  let msg: Value = serde_json::from_slice(&message.value).unwrap();
  assert_eq!(json!("TIDB_WATERMARK"), msg["type"]);
  assert_eq!(json!(1591943372224i64), msg["es"]);
  assert_eq!(json!({ "watermarkTs": COMMIT_TS }), msg["_tidb"]);

  // visible, but only a decoder with the extension can consume it
  let mut decoder = CanalJsonDecoder::from_messages([&message], false);
  assert_eq!((MessageType::Resolved, true), decoder.has_next().unwrap());
  assert!(decoder.next_resolved_event().unwrap_err().is_decode());
}

#[test]
fn test_watermarks_decode_in_order() {
  let encoder = new_encoder(true);
  let mut messages = vec![];
  for ts in [COMMIT_TS, COMMIT_TS + 1, COMMIT_TS + (1 << 18)] {
    messages.push(encoder.encode_checkpoint_event(ts).unwrap().unwrap());
  }

  let mut decoder = CanalJsonDecoder::from_messages(&messages, true);
  let mut resolved = vec![];
  while let (MessageType::Resolved, true) = decoder.has_next().unwrap() {
    resolved.push(decoder.next_resolved_event().unwrap());
  }
  assert_eq!(vec![COMMIT_TS, COMMIT_TS + 1, COMMIT_TS + (1 << 18)], resolved);
}

#[test]
fn test_batching() {
  let mut encoder = new_encoder(false);
  let mut e = update_event();
  let mut last_resolved = 0;

  for i in 1..1000u64 {
    e.commit_ts = i;
    assert_eq!(EncoderResult::NoOperation, encoder.append_row_changed_event(&e).unwrap());

    if i >= 100 && (i % 100 == 0 || i == 999) {
      let resolved_ts = if i == 999 { 999 } else { i - 50 };
      assert_eq!(EncoderResult::NeedAsyncWrite, encoder.append_resolved_event(resolved_ts).unwrap());

      let messages = encoder.build().unwrap();
      assert_eq!((resolved_ts - last_resolved) as usize, messages.len());
      for (j, message) in messages.iter().enumerate() {
        assert_eq!(last_resolved + j as u64 + 1, message.ts);
      }
      last_resolved = resolved_ts;
    }
  }

  assert_eq!(0, encoder.unresolved_len());
  assert_eq!(0, encoder.resolved_len());
}

#[test]
fn test_ddl_is_not_buffered() {
  let mut encoder = new_encoder(false);
  let mut e = update_event();
  e.commit_ts = 10;
  encoder.append_row_changed_event(&e).unwrap();

  encoder.encode_ddl_event(&ddl_event()).unwrap();
  assert_eq!(1, encoder.unresolved_len());
  assert!(encoder.build().unwrap().is_empty());
}

#[test]
fn test_decoder_exhausted() {
  let mut decoder = CanalJsonDecoder::new(Vec::new(), true);
  assert_eq!((MessageType::Unknown, false), decoder.has_next().unwrap());
  assert!(decoder.next_row_changed_event().unwrap_err().is_decode());
  assert!(decoder.next_ddl_event().unwrap_err().is_decode());
  assert!(decoder.next_resolved_event().unwrap_err().is_decode());
}

#[test]
fn test_mixed_batch_through_registry() {
  let url = url::Url::parse("kafka://127.0.0.1:9092/cdc?protocol=canal-json&enable-tidb-extension=true").unwrap();
  let options = SinkOptions::try_from(&url).unwrap();
  let mut encoder = new_event_batch_encoder(&options, &metrics()).unwrap();

  let mut e = update_event();
  e.commit_ts = 100;
  encoder.append_row_changed_event(&e).unwrap();
  encoder.append_resolved_event(100).unwrap();

  let mut values = encoder.build().unwrap().into_iter().map(|m| m.value).collect::<Vec<_>>();
  values.push(encoder.encode_ddl_event(&ddl_event()).unwrap().value);
  values.push(encoder.encode_checkpoint_event(200).unwrap().unwrap().value);

  let mut decoder = new_event_batch_decoder(Protocol::CanalJson, values, true).unwrap();
  assert_eq!((MessageType::Row, true), decoder.has_next().unwrap());
  assert_eq!(100, decoder.next_row_changed_event().unwrap().commit_ts);
  assert_eq!((MessageType::Ddl, true), decoder.has_next().unwrap());
  assert_eq!(COMMIT_TS, decoder.next_ddl_event().unwrap().commit_ts);
  assert_eq!((MessageType::Resolved, true), decoder.has_next().unwrap());
  assert_eq!(200, decoder.next_resolved_event().unwrap());
  assert_eq!((MessageType::Unknown, false), decoder.has_next().unwrap());
}

#[test]
fn test_unflagged_unsigned_round_trip() {
  let mut encoder = new_encoder(false);
  let e = RowChangedEvent {
    commit_ts: 1,
    table: TableName::new("cdc", "person"),
    columns: Some(vec![
      Column::new("big", ColumnType::MYSQL_TYPE_LONGLONG, u64::MAX.into()),
      Column::new("neg", ColumnType::MYSQL_TYPE_LONGLONG, (-1i64).into()),
      Column::new("tiny", ColumnType::MYSQL_TYPE_TINY, 255u64.into()),
    ]),
    ..Default::default()
  };
  encoder.append_row_changed_event(&e).unwrap();
  encoder.append_resolved_event(1).unwrap();
  let messages = encoder.build().unwrap();
  assert_eq!(messages[0].value.len(), messages[0].length());

  let mut decoder = CanalJsonDecoder::from_messages(&messages, false);
  let columns = decoder.next_row_changed_event().unwrap().columns.unwrap();
  let values = columns.iter().map(|c| (c.name.as_str(), c.value.clone())).collect::<Vec<_>>();
  assert_eq!(
    vec![
      ("big", ColumnValue::Unsigned(u64::MAX)),
      ("neg", ColumnValue::Signed(-1)),
      ("tiny", ColumnValue::Signed(255)),
    ],
    values
  );
}

#[test]
fn test_unsupported_values() {
  let mut encoder = new_encoder(false);
  let mut e = update_event();
  e.columns
    .as_mut()
    .unwrap()
    .push(Column::new("ratio", ColumnType::MYSQL_TYPE_DOUBLE, ColumnValue::Float(f64::INFINITY)));

  assert!(encoder.append_row_changed_event(&e).unwrap_err().is_encode());
  assert_eq!(0, encoder.unresolved_len());
}
