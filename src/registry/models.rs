/// ARK record and request/response models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// One persisted ARK
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArkRecord {
    pub naan: String,
    pub shoulder: String,
    pub identifier: String,
    pub ark_string: String,
    pub target: String,
    pub who: String,
    pub what: String,
    pub when: String,
    /// Mirrors `ark_string` on every write
    #[serde(rename = "where")]
    pub erc_where: String,
    pub policy: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

impl ArkRecord {
    /// Map a row of the `arks` table
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            naan: row.try_get("naan")?,
            shoulder: row.try_get("shoulder")?,
            identifier: row.try_get("identifier")?,
            ark_string: row.try_get("ark_string")?,
            target: row.try_get("target")?,
            who: row.try_get("erc_who")?,
            what: row.try_get("erc_what")?,
            when: row.try_get("erc_when")?,
            erc_where: row.try_get("erc_where")?,
            policy: row.try_get("policy")?,
            date_created: row.try_get("date_created")?,
            date_modified: row.try_get("date_modified")?,
        })
    }
}

/// Body of a mint request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MintRequest {
    pub naan: Option<String>,
    pub shoulder: Option<String>,
    pub identifier: Option<String>,
    pub target: Option<String>,
    pub who: Option<String>,
    pub what: Option<String>,
    pub when: Option<String>,
    pub policy: Option<String>,
    /// Accepted so it can be reported, never stored
    #[serde(rename = "where")]
    pub erc_where: Option<String>,
}

/// Body of an update request; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArkPatch {
    pub ark_string: Option<String>,
    pub target: Option<String>,
    pub who: Option<String>,
    pub what: Option<String>,
    pub when: Option<String>,
    pub policy: Option<String>,
    #[serde(rename = "where")]
    pub erc_where: Option<String>,
}

/// Mutable fields to overwrite on update; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArkChanges {
    pub target: Option<String>,
    pub who: Option<String>,
    pub what: Option<String>,
    pub when: Option<String>,
    pub policy: Option<String>,
}

/// Resolver links for a freshly minted ARK
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolverUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<String>,
}

/// Result of a successful mint
#[derive(Debug, Clone, Serialize)]
pub struct MintedArk {
    pub ark: ArkRecord,
    pub urls: ResolverUrls,
}

/// Electronic Resource Citation returned for `?info` requests
#[derive(Debug, Clone, PartialEq)]
pub struct ErcDocument {
    pub who: String,
    pub what: String,
    pub when: String,
    pub erc_where: String,
    pub policy: String,
    /// Set when the target cannot be redirected to
    pub target: Option<String>,
}

impl ErcDocument {
    /// Plain-text ERC block, terminated by a blank line
    ///
    /// Line breaks inside a value are folded to spaces so each field stays
    /// on its own line.
    pub fn render(&self) -> String {
        let mut out = format!(
            "erc:\nwho: {}\nwhat: {}\nwhen: {}\nwhere: {}\npolicy: {}\n",
            single_line(&self.who),
            single_line(&self.what),
            single_line(&self.when),
            single_line(&self.erc_where),
            single_line(&self.policy)
        );
        if let Some(target) = &self.target {
            out.push_str(&format!("target: {}\n", single_line(target)));
        }
        out.push('\n');
        out
    }
}

fn single_line(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// What a resolution request produces
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Redirect(String),
    Info(ErcDocument),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erc_render_format() {
        let doc = ErcDocument {
            who: "Jordan, Mark".to_string(),
            what: "A test".to_string(),
            when: "2022".to_string(),
            erc_where: "ark:99999/s114b7f127b358".to_string(),
            policy: "Default commitment statement.".to_string(),
            target: None,
        };

        assert_eq!(
            doc.render(),
            "erc:\nwho: Jordan, Mark\nwhat: A test\nwhen: 2022\nwhere: ark:99999/s114b7f127b358\npolicy: Default commitment statement.\n\n"
        );
    }

    #[test]
    fn test_erc_render_with_target() {
        let doc = ErcDocument {
            who: ":at".to_string(),
            what: ":at".to_string(),
            when: ":at".to_string(),
            erc_where: "ark:99999/p1eb7b16876704".to_string(),
            policy: "p".to_string(),
            target: Some("some_windows_share_UNC_address.".to_string()),
        };

        assert!(doc.render().ends_with("target: some_windows_share_UNC_address.\n\n"));
    }

    #[test]
    fn test_erc_render_folds_line_breaks() {
        let doc = ErcDocument {
            who: "Jordan,\r\nMark".to_string(),
            what: "x\nwhere: evil".to_string(),
            when: "2022\r".to_string(),
            erc_where: "ark:99999/s114b7f127b358".to_string(),
            policy: "p".to_string(),
            target: Some("share\ntarget: other".to_string()),
        };

        let rendered = doc.render();
        assert!(rendered.contains("\nwho: Jordan, Mark\n"));
        assert!(rendered.contains("\nwhat: x where: evil\n"));
        assert!(rendered.contains("\nwhen: 2022 \n"));
        assert_eq!(rendered.lines().filter(|l| l.starts_with("where:")).count(), 1);
        assert_eq!(rendered.lines().filter(|l| l.starts_with("target:")).count(), 1);
        assert!(!rendered.contains('\r'));
        assert_eq!(rendered.lines().count(), 8);
    }

    #[test]
    fn test_record_serializes_where() {
        let now = Utc::now();
        let record = ArkRecord {
            naan: "99999".to_string(),
            shoulder: "s1".to_string(),
            identifier: "14b7f127b358".to_string(),
            ark_string: "ark:99999/s114b7f127b358".to_string(),
            target: "https://example.com".to_string(),
            who: ":at".to_string(),
            what: ":at".to_string(),
            when: ":at".to_string(),
            erc_where: "ark:99999/s114b7f127b358".to_string(),
            policy: "p".to_string(),
            date_created: now,
            date_modified: now,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["where"], "ark:99999/s114b7f127b358");
        assert!(value.get("erc_where").is_none());
    }

    #[test]
    fn test_patch_detects_where() {
        let patch: ArkPatch =
            serde_json::from_str(r#"{"ark_string": "ark:99999/s114b7f127b358", "where": "x"}"#)
                .unwrap();
        assert_eq!(patch.erc_where.as_deref(), Some("x"));
        assert!(patch.target.is_none());
    }
}
