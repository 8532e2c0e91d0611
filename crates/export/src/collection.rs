//! The `collection.anki2` SQLite database inside a package.
//!
//! Schema version 11, the format Anki 2.1 still imports.

use regex::Regex;
use serde_json::{json, Value};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use deckgen_core::ExportJob;

use crate::error::Result;
use crate::note_type::NoteType;

/// Creation time stamped on every collection (seconds).
const COLLECTION_CREATED: i64 = 1_411_124_400;

const SCHEMA: &[&str] = &[
    "CREATE TABLE col (
        id integer primary key,
        crt integer not null,
        mod integer not null,
        scm integer not null,
        ver integer not null,
        dty integer not null,
        usn integer not null,
        ls integer not null,
        conf text not null,
        models text not null,
        decks text not null,
        dconf text not null,
        tags text not null
    )",
    "CREATE TABLE notes (
        id integer primary key,
        guid text not null,
        mid integer not null,
        mod integer not null,
        usn integer not null,
        tags text not null,
        flds text not null,
        sfld integer not null,
        csum integer not null,
        flags integer not null,
        data text not null
    )",
    "CREATE TABLE cards (
        id integer primary key,
        nid integer not null,
        did integer not null,
        ord integer not null,
        mod integer not null,
        usn integer not null,
        type integer not null,
        queue integer not null,
        due integer not null,
        ivl integer not null,
        factor integer not null,
        reps integer not null,
        lapses integer not null,
        left integer not null,
        odue integer not null,
        odid integer not null,
        flags integer not null,
        data text not null
    )",
    "CREATE TABLE revlog (
        id integer primary key,
        cid integer not null,
        usn integer not null,
        ease integer not null,
        ivl integer not null,
        lastIvl integer not null,
        factor integer not null,
        time integer not null,
        type integer not null
    )",
    "CREATE TABLE graves (
        usn integer not null,
        oid integer not null,
        type integer not null
    )",
    "CREATE INDEX ix_notes_usn ON notes (usn)",
    "CREATE INDEX ix_cards_usn ON cards (usn)",
    "CREATE INDEX ix_revlog_usn ON revlog (usn)",
    "CREATE INDEX ix_cards_nid ON cards (nid)",
    "CREATE INDEX ix_cards_sched ON cards (did, queue, due)",
    "CREATE INDEX ix_revlog_cid ON revlog (cid)",
    "CREATE INDEX ix_notes_csum ON notes (csum)",
];

/// Identifiers chosen for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckIds {
    /// Deck id, in [2^30, 2^31)
    pub deck_id: i64,
    /// Note type id, in [2^30, 2^31)
    pub model_id: i64,
}

impl DeckIds {
    /// Fresh random ids.
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        Self {
            deck_id: rng.random_range(1 << 30..1 << 31),
            model_id: rng.random_range(1 << 30..1 << 31),
        }
    }
}

/// Write a complete collection for `job` at `path`.
///
/// The job must already be validated. Returns the number of card rows.
pub async fn write_collection(path: &Path, job: &ExportJob, ids: DeckIds) -> Result<usize> {
    let now = chrono::Utc::now();
    let now_ms = now.timestamp_millis();
    let now_s = now.timestamp();
    let note_type = NoteType::for_kind(job.card_kind);

    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .connect()
        .await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut conn).await?;
    }

    let mut tx = conn.begin().await?;

    sqlx::query(
        "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags)
        VALUES (1, ?, ?, ?, 11, 0, 0, 0, ?, ?, ?, ?, '{}')",
    )
    .bind(COLLECTION_CREATED)
    .bind(now_ms)
    .bind(now_ms)
    .bind(conf_json(ids.model_id).to_string())
    .bind(json!({ ids.model_id.to_string(): note_type.to_model_json(ids.model_id, ids.deck_id, now_s) }).to_string())
    .bind(decks_json(&job.deck_name, ids.deck_id, now_s).to_string())
    .bind(dconf_json().to_string())
    .execute(&mut *tx)
    .await?;

    let tags = match job.tag_string() {
        t if t.is_empty() => String::new(),
        t => format!(" {} ", t),
    };

    let mut card_id = now_ms;
    let mut card_rows = 0;
    for (position, card) in job.cards.iter().enumerate() {
        let note_id = now_ms + position as i64;
        let fields = note_type.fields_for(&card.content);
        let sort_field = strip_html(&fields[0]);

        sqlx::query(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
            VALUES (?, ?, ?, ?, -1, ?, ?, ?, ?, 0, '')",
        )
        .bind(note_id)
        .bind(guid_for(ids.deck_id, &fields))
        .bind(ids.model_id)
        .bind(now_s)
        .bind(&tags)
        .bind(fields.join("\x1f"))
        .bind(&sort_field)
        .bind(checksum(&sort_field))
        .execute(&mut *tx)
        .await?;

        for ord in note_type.ordinals_for(&card.content) {
            sqlx::query(
                "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor,
                    reps, lapses, left, odue, odid, flags, data)
                VALUES (?, ?, ?, ?, ?, -1, 0, 0, ?, 0, 0, 0, 0, 0, 0, 0, 0, '')",
            )
            .bind(card_id)
            .bind(note_id)
            .bind(ids.deck_id)
            .bind(ord)
            .bind(now_s)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
            card_id += 1;
            card_rows += 1;
        }
    }

    tx.commit().await?;
    conn.close().await?;

    debug!(notes = job.cards.len(), cards = card_rows, "Wrote collection {}", path.display());
    Ok(card_rows)
}

fn conf_json(model_id: i64) -> Value {
    json!({
        "activeDecks": [1],
        "addToCur": true,
        "collapseTime": 1200,
        "curDeck": 1,
        "curModel": model_id.to_string(),
        "dueCounts": true,
        "estTimes": true,
        "newBury": true,
        "newSpread": 0,
        "nextPos": 1,
        "sortBackwards": false,
        "sortType": "noteFld",
        "timeLim": 0,
    })
}

fn deck_json(id: i64, name: &str, modified: i64) -> Value {
    json!({
        "collapsed": false,
        "conf": 1,
        "desc": "",
        "dyn": 0,
        "extendNew": 10,
        "extendRev": 50,
        "id": id,
        "lrnToday": [0, 0],
        "mod": modified,
        "name": name,
        "newToday": [0, 0],
        "revToday": [0, 0],
        "timeToday": [0, 0],
        "usn": -1,
    })
}

fn decks_json(deck_name: &str, deck_id: i64, modified: i64) -> Value {
    json!({
        "1": deck_json(1, "Default", modified),
        deck_id.to_string(): deck_json(deck_id, deck_name, modified),
    })
}

fn dconf_json() -> Value {
    json!({
        "1": {
            "autoplay": true,
            "id": 1,
            "lapse": {
                "delays": [10],
                "leechAction": 0,
                "leechFails": 8,
                "minInt": 1,
                "mult": 0,
            },
            "maxTaken": 60,
            "mod": 0,
            "name": "Default",
            "new": {
                "bury": true,
                "delays": [1, 10],
                "initialFactor": 2500,
                "ints": [1, 4, 7],
                "order": 1,
                "perDay": 20,
                "separate": true,
            },
            "replayq": true,
            "rev": {
                "bury": true,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1,
                "maxIvl": 36500,
                "minSpace": 1,
                "perDay": 100,
            },
            "timer": 0,
            "usn": 0,
        }
    })
}

fn html_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// Field text with HTML tags removed, as Anki stores `sfld`.
pub fn strip_html(text: &str) -> String {
    html_tag_regex().replace_all(text, "").trim().to_string()
}

/// First 32 bits of the SHA-1 of `text`, the duplicate-check hash Anki keeps in `csum`.
pub fn checksum(text: &str) -> i64 {
    let digest = Sha1::digest(text.as_bytes());
    let mut word = [0u8; 4];
    word.copy_from_slice(&digest[..4]);
    i64::from(u32::from_be_bytes(word))
}

const BASE91: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// Note guid derived from the deck id and field values.
///
/// Deck ids are fresh per export, so re-exporting the same cards yields new
/// guids and the importer treats them as a new deck.
pub fn guid_for(deck_id: i64, fields: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(deck_id.to_string().as_bytes());
    for field in fields {
        hasher.update([0x1fu8]);
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    let mut n = u64::from_be_bytes(word);

    let mut out = Vec::new();
    loop {
        out.push(BASE91[(n % 91) as usize]);
        n /= 91;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base91_alphabet() {
        assert_eq!(BASE91.len(), 91);
    }

    #[test]
    fn test_guid_depends_on_deck_and_fields() {
        let fields = vec!["q".to_string(), "a".to_string()];
        let a = guid_for(1 << 30, &fields);
        assert_eq!(a, guid_for(1 << 30, &fields));
        assert_ne!(a, guid_for((1 << 30) + 1, &fields));
        assert_ne!(a, guid_for(1 << 30, &["q".to_string(), "b".to_string()]));
        assert!(a.len() <= 10);
    }

    #[test]
    fn test_strip_html_and_checksum() {
        assert_eq!(strip_html("<b>Rust</b> <br>rocks"), "Rust rocks");
        // sha1("") = da39a3ee...
        assert_eq!(checksum(""), 0xda39a3ee);
    }

    #[test]
    fn test_random_ids_in_range() {
        for _ in 0..32 {
            let ids = DeckIds::random();
            assert!((1 << 30..1 << 31).contains(&ids.deck_id));
            assert!((1 << 30..1 << 31).contains(&ids.model_id));
        }
    }
}
