use anyhow::anyhow;
use chrono::{
  DateTime,
  Local,
  NaiveDateTime,
  SecondsFormat,
  Utc
};

const COMPACT_FORMAT: &str =
  "%Y%m%dT%H%M%SZ";

/// Renders a timestamp the way it is
/// persisted: RFC 3339, millisecond
/// precision, `Z` suffix.
pub fn format_timestamp(
  dt: &DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

/// Parses a persisted timestamp.
/// Accepts RFC 3339 (any offset,
/// normalized to UTC) and the compact
/// `YYYYMMDDTHHMMSSZ` form.
pub fn parse_timestamp(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "timestamp cannot be empty"
    ));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Ok(dt.with_timezone(&Utc));
  }

  NaiveDateTime::parse_from_str(
    trimmed,
    COMPACT_FORMAT
  )
  .map(|ndt| {
    DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc)
  })
  .map_err(|e| {
    anyhow!(
      "invalid timestamp \
       '{trimmed}': {e}"
    )
  })
}

pub fn format_local_date(
  dt: &DateTime<Utc>
) -> String {
  dt.with_timezone(&Local)
    .format("%Y-%m-%d")
    .to_string()
}

pub mod timestamp_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_timestamp(dt)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_timestamp(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          serializer.serialize_some(
            &super::super::format_timestamp(value)
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let raw = Option::<String>::deserialize(
        deserializer
      )?;
      match raw {
        | Some(value) => {
          super::super::parse_timestamp(
            &value
          )
          .map(Some)
          .map_err(
            serde::de::Error::custom
          )
        }
        | None => Ok(None)
      }
    }
  }
}
