use bitflags::bitflags;

// Column flags carried by the upstream row events. These are the changefeed's
// own bits, not the MySQL protocol column-definition flags.
bitflags! {
  #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
  pub struct ColumnFlags: u64 {
    const BINARY = 0x0001;
    const HANDLE_KEY = 0x0002;
    const GENERATED = 0x0004;
    const PRIMARY_KEY = 0x0008;
    const UNIQUE_KEY = 0x0010;
    const MULTIPLE_KEY = 0x0020;
    const NULLABLE = 0x0040;
    const UNSIGNED = 0x0080;
  }
}

impl ColumnFlags {
  pub fn is_binary(&self) -> bool {
    self.contains(Self::BINARY)
  }

  pub fn is_primary_key(&self) -> bool {
    self.contains(Self::PRIMARY_KEY)
  }

  pub fn is_unsigned(&self) -> bool {
    self.contains(Self::UNSIGNED)
  }
}

/// Type of MySql column field
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum ColumnType {
  MYSQL_TYPE_DECIMAL = 0x00_u8,
  MYSQL_TYPE_TINY = 0x01_u8,
  MYSQL_TYPE_SHORT = 0x02_u8,
  MYSQL_TYPE_LONG = 0x03_u8,
  MYSQL_TYPE_FLOAT = 0x04_u8,
  MYSQL_TYPE_DOUBLE = 0x05_u8,
  MYSQL_TYPE_NULL = 0x06_u8,
  MYSQL_TYPE_TIMESTAMP = 0x07_u8,
  MYSQL_TYPE_LONGLONG = 0x08_u8,
  MYSQL_TYPE_INT24 = 0x09_u8,
  MYSQL_TYPE_DATE = 0x0a_u8,
  MYSQL_TYPE_TIME = 0x0b_u8,
  MYSQL_TYPE_DATETIME = 0x0c_u8,
  MYSQL_TYPE_YEAR = 0x0d_u8,
  MYSQL_TYPE_NEWDATE = 0x0e_u8,
  MYSQL_TYPE_VARCHAR = 0x0f_u8,
  MYSQL_TYPE_BIT = 0x10_u8,
  MYSQL_TYPE_TIMESTAMP2 = 0x11_u8,
  MYSQL_TYPE_DATETIME2 = 0x12_u8,
  MYSQL_TYPE_TIME2 = 0x13_u8,
  MYSQL_TYPE_JSON = 0xf5_u8,
  MYSQL_TYPE_NEWDECIMAL = 0xf6_u8,
  MYSQL_TYPE_ENUM = 0xf7_u8,
  MYSQL_TYPE_SET = 0xf8_u8,
  MYSQL_TYPE_TINY_BLOB = 0xf9_u8,
  MYSQL_TYPE_MEDIUM_BLOB = 0xfa_u8,
  MYSQL_TYPE_LONG_BLOB = 0xfb_u8,
  MYSQL_TYPE_BLOB = 0xfc_u8,
  MYSQL_TYPE_VAR_STRING = 0xfd_u8,
  MYSQL_TYPE_STRING = 0xfe_u8,
  MYSQL_TYPE_GEOMETRY = 0xff_u8,
}

impl TryFrom<u8> for ColumnType {
  type Error = u8;

  fn try_from(v: u8) -> Result<Self, Self::Error> {
    match v {
      0x00_u8 => Ok(ColumnType::MYSQL_TYPE_DECIMAL),
      0x01_u8 => Ok(ColumnType::MYSQL_TYPE_TINY),
      0x02_u8 => Ok(ColumnType::MYSQL_TYPE_SHORT),
      0x03_u8 => Ok(ColumnType::MYSQL_TYPE_LONG),
      0x04_u8 => Ok(ColumnType::MYSQL_TYPE_FLOAT),
      0x05_u8 => Ok(ColumnType::MYSQL_TYPE_DOUBLE),
      0x06_u8 => Ok(ColumnType::MYSQL_TYPE_NULL),
      0x07_u8 => Ok(ColumnType::MYSQL_TYPE_TIMESTAMP),
      0x08_u8 => Ok(ColumnType::MYSQL_TYPE_LONGLONG),
      0x09_u8 => Ok(ColumnType::MYSQL_TYPE_INT24),
      0x0a_u8 => Ok(ColumnType::MYSQL_TYPE_DATE),
      0x0b_u8 => Ok(ColumnType::MYSQL_TYPE_TIME),
      0x0c_u8 => Ok(ColumnType::MYSQL_TYPE_DATETIME),
      0x0d_u8 => Ok(ColumnType::MYSQL_TYPE_YEAR),
      0x0e_u8 => Ok(ColumnType::MYSQL_TYPE_NEWDATE),
      0x0f_u8 => Ok(ColumnType::MYSQL_TYPE_VARCHAR),
      0x10_u8 => Ok(ColumnType::MYSQL_TYPE_BIT),
      0x11_u8 => Ok(ColumnType::MYSQL_TYPE_TIMESTAMP2),
      0x12_u8 => Ok(ColumnType::MYSQL_TYPE_DATETIME2),
      0x13_u8 => Ok(ColumnType::MYSQL_TYPE_TIME2),
      0xf5_u8 => Ok(ColumnType::MYSQL_TYPE_JSON),
      0xf6_u8 => Ok(ColumnType::MYSQL_TYPE_NEWDECIMAL),
      0xf7_u8 => Ok(ColumnType::MYSQL_TYPE_ENUM),
      0xf8_u8 => Ok(ColumnType::MYSQL_TYPE_SET),
      0xf9_u8 => Ok(ColumnType::MYSQL_TYPE_TINY_BLOB),
      0xfa_u8 => Ok(ColumnType::MYSQL_TYPE_MEDIUM_BLOB),
      0xfb_u8 => Ok(ColumnType::MYSQL_TYPE_LONG_BLOB),
      0xfc_u8 => Ok(ColumnType::MYSQL_TYPE_BLOB),
      0xfd_u8 => Ok(ColumnType::MYSQL_TYPE_VAR_STRING),
      0xfe_u8 => Ok(ColumnType::MYSQL_TYPE_STRING),
      0xff_u8 => Ok(ColumnType::MYSQL_TYPE_GEOMETRY),
      unsupported => Err(unsupported),
    }
  }
}

impl ColumnType {
  /// Lower-case SQL name of the type, as printed by `SHOW CREATE TABLE` for a
  /// non-binary, signed column.
  pub fn type_name(&self) -> &'static str {
    match self {
      ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => "decimal",
      ColumnType::MYSQL_TYPE_TINY => "tinyint",
      ColumnType::MYSQL_TYPE_SHORT => "smallint",
      ColumnType::MYSQL_TYPE_LONG => "int",
      ColumnType::MYSQL_TYPE_FLOAT => "float",
      ColumnType::MYSQL_TYPE_DOUBLE => "double",
      ColumnType::MYSQL_TYPE_NULL => "null",
      ColumnType::MYSQL_TYPE_TIMESTAMP | ColumnType::MYSQL_TYPE_TIMESTAMP2 => "timestamp",
      ColumnType::MYSQL_TYPE_LONGLONG => "bigint",
      ColumnType::MYSQL_TYPE_INT24 => "mediumint",
      ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => "date",
      ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => "time",
      ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_DATETIME2 => "datetime",
      ColumnType::MYSQL_TYPE_YEAR => "year",
      ColumnType::MYSQL_TYPE_VARCHAR => "varchar",
      ColumnType::MYSQL_TYPE_BIT => "bit",
      ColumnType::MYSQL_TYPE_JSON => "json",
      ColumnType::MYSQL_TYPE_ENUM => "enum",
      ColumnType::MYSQL_TYPE_SET => "set",
      ColumnType::MYSQL_TYPE_TINY_BLOB => "tinytext",
      ColumnType::MYSQL_TYPE_MEDIUM_BLOB => "mediumtext",
      ColumnType::MYSQL_TYPE_LONG_BLOB => "longtext",
      ColumnType::MYSQL_TYPE_BLOB => "text",
      ColumnType::MYSQL_TYPE_VAR_STRING => "var_string",
      ColumnType::MYSQL_TYPE_STRING => "char",
      ColumnType::MYSQL_TYPE_GEOMETRY => "geometry",
    }
  }

  /// Reverse of [`ColumnType::type_name`], also accepting the binary spellings
  /// (`blob`, `binary`, `varbinary`, ...). The `bool` is true for those.
  pub fn from_type_name(name: &str) -> Option<(Self, bool)> {
    let t = match name {
      "decimal" => (ColumnType::MYSQL_TYPE_NEWDECIMAL, false),
      "tinyint" => (ColumnType::MYSQL_TYPE_TINY, false),
      "smallint" => (ColumnType::MYSQL_TYPE_SHORT, false),
      "int" => (ColumnType::MYSQL_TYPE_LONG, false),
      "float" => (ColumnType::MYSQL_TYPE_FLOAT, false),
      "double" => (ColumnType::MYSQL_TYPE_DOUBLE, false),
      "null" => (ColumnType::MYSQL_TYPE_NULL, false),
      "timestamp" => (ColumnType::MYSQL_TYPE_TIMESTAMP, false),
      "bigint" => (ColumnType::MYSQL_TYPE_LONGLONG, false),
      "mediumint" => (ColumnType::MYSQL_TYPE_INT24, false),
      "date" => (ColumnType::MYSQL_TYPE_DATE, false),
      "time" => (ColumnType::MYSQL_TYPE_TIME, false),
      "datetime" => (ColumnType::MYSQL_TYPE_DATETIME, false),
      "year" => (ColumnType::MYSQL_TYPE_YEAR, false),
      "varchar" => (ColumnType::MYSQL_TYPE_VARCHAR, false),
      "bit" => (ColumnType::MYSQL_TYPE_BIT, false),
      "json" => (ColumnType::MYSQL_TYPE_JSON, false),
      "enum" => (ColumnType::MYSQL_TYPE_ENUM, false),
      "set" => (ColumnType::MYSQL_TYPE_SET, false),
      "tinytext" => (ColumnType::MYSQL_TYPE_TINY_BLOB, false),
      "mediumtext" => (ColumnType::MYSQL_TYPE_MEDIUM_BLOB, false),
      "longtext" => (ColumnType::MYSQL_TYPE_LONG_BLOB, false),
      "text" => (ColumnType::MYSQL_TYPE_BLOB, false),
      "var_string" => (ColumnType::MYSQL_TYPE_VAR_STRING, false),
      "char" => (ColumnType::MYSQL_TYPE_STRING, false),
      "geometry" => (ColumnType::MYSQL_TYPE_GEOMETRY, false),
      "tinyblob" => (ColumnType::MYSQL_TYPE_TINY_BLOB, true),
      "mediumblob" => (ColumnType::MYSQL_TYPE_MEDIUM_BLOB, true),
      "longblob" => (ColumnType::MYSQL_TYPE_LONG_BLOB, true),
      "blob" => (ColumnType::MYSQL_TYPE_BLOB, true),
      "binary" => (ColumnType::MYSQL_TYPE_STRING, true),
      "varbinary" => (ColumnType::MYSQL_TYPE_VARCHAR, true),
      _ => return None,
    };
    Some(t)
  }

  pub fn is_blob(&self) -> bool {
    matches!(
      self,
      ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
    )
  }

  pub fn is_char(&self) -> bool {
    matches!(self, ColumnType::MYSQL_TYPE_STRING | ColumnType::MYSQL_TYPE_VARCHAR)
  }

  pub fn is_integer(&self) -> bool {
    matches!(
      self,
      ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR
    )
  }

  pub fn is_float(&self) -> bool {
    matches!(self, ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE)
  }
}
