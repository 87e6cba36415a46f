use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::remote::{
  DEFAULT_BASE_URL,
  DEFAULT_TIMEOUT_SECS
};
use crate::tasks::TaskFilter;

#[derive(Debug, Clone)]
pub struct Config {
  map: BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = BTreeMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.tally".to_string()
    );
    map.insert(
      "api.base_url".to_string(),
      DEFAULT_BASE_URL.to_string()
    );
    map.insert(
      "api.timeout_secs".to_string(),
      DEFAULT_TIMEOUT_SECS.to_string()
    );
    map.insert(
      "list.filter".to_string(),
      "all".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading config");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no tallyrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    self
      .map
      .get(key)
      .map(|v| {
        v.trim().parse::<u64>().map_err(
          |e| {
            anyhow!(
              "invalid number for \
               {key}: {v} ({e})"
            )
          }
        )
      })
      .transpose()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn api_base_url(&self) -> String {
    self
      .get("api.base_url")
      .unwrap_or_else(|| {
        DEFAULT_BASE_URL.to_string()
      })
  }

  pub fn api_timeout(
    &self
  ) -> anyhow::Result<Duration> {
    let secs = self
      .get_u64("api.timeout_secs")?
      .unwrap_or(DEFAULT_TIMEOUT_SECS);
    if secs == 0 {
      return Err(anyhow!(
        "api.timeout_secs must be \
         greater than zero"
      ));
    }
    Ok(Duration::from_secs(secs))
  }

  pub fn default_filter(
    &self
  ) -> anyhow::Result<TaskFilter> {
    match self.get("list.filter") {
      | Some(raw) => raw
        .parse::<TaskFilter>()
        .context(
          "invalid list.filter setting"
        ),
      | None => Ok(TaskFilter::All)
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("TALLYRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping tallyrc"
    );
    return Ok(None);
  };
  let candidate = home.join(".tallyrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".tally"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::Config;
  use crate::tasks::TaskFilter;

  #[test]
  fn defaults_are_usable() {
    let cfg = Config::default();
    assert_eq!(
      cfg.api_timeout().unwrap(),
      Duration::from_secs(30)
    );
    assert_eq!(
      cfg.default_filter().unwrap(),
      TaskFilter::All
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(true)
    );
    assert!(
      cfg
        .api_base_url()
        .starts_with("https://")
    );
  }

  #[test]
  fn loads_file_with_include_and_comments()
   {
    let dir = tempdir().unwrap();
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "api.timeout_secs = 5\n"
    )
    .unwrap();

    let main = dir.path().join("tallyrc");
    fs::write(
      &main,
      "# comment\n\
       list.filter=active  # trailing\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .unwrap();

    let cfg =
      Config::load(Some(&main)).unwrap();
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.default_filter().unwrap(),
      TaskFilter::Active
    );
    assert_eq!(
      cfg.api_timeout().unwrap(),
      Duration::from_secs(5)
    );
  }

  #[test]
  fn rejects_malformed_lines() {
    let dir = tempdir().unwrap();
    let main = dir.path().join("tallyrc");
    fs::write(&main, "not a setting\n")
      .unwrap();
    assert!(
      Config::load(Some(&main)).is_err()
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "rc.api.timeout_secs".to_string(),
        "0".to_string()
      ),
      (
        "color".to_string(),
        "off".to_string()
      ),
    ]);
    assert!(cfg.api_timeout().is_err());
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );
  }
}
