//! Decoding raw journal documents into typed [`ChangeEvent`]s.
//!
//! The journal discriminates entry kinds only by the `what` field and the
//! shape of `details`; this module is the single place those raw documents
//! are inspected.

use bson::Document;
use data_types::{ChangeEvent, ChunkRange, ChunkSpec, KeyError, MovePhase, ShardKeyTuple, ShardName, ShardVersion};
use snafu::{ResultExt, Snafu};

/// The journal `what` values the reconstruction cares about; everything
/// else is left to [`decode_entry`] to ignore.
pub const JOURNAL_KINDS: [&str; 6] = [
    "split",
    "multi-split",
    "moveChunk.from",
    "moveChunk.start",
    "moveChunk.to",
    "moveChunk.commit",
];

/// Errors decoding a recognized journal entry that is missing required
/// fields. The walker logs and skips such entries.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum DecodeError {
    #[snafu(display("journal entry missing or invalid field `{field}`: {source}"))]
    Field {
        field: String,
        source: bson::document::ValueAccessError,
    },

    #[snafu(display("journal entry has an invalid shard key in `{field}`: {source}"))]
    Key { field: String, source: KeyError },

    #[snafu(display("journal entry sub-record `{field}` min/max disagree on shard key fields"))]
    KeyFieldsDiffer { field: String },
}

/// Decode one journal document.
///
/// Returns `Ok(None)` for entry kinds the reconstruction does not model;
/// those are silently skipped upstream.
pub fn decode_entry(doc: &Document) -> Result<Option<ChangeEvent>, DecodeError> {
    let what = doc.get_str("what").context(FieldSnafu { field: "what" })?;
    let phase = match what {
        "split" => return decode_split(doc).map(Some),
        "multi-split" => return decode_multi_split(doc).map(Some),
        "moveChunk.from" => MovePhase::From,
        "moveChunk.start" => MovePhase::Start,
        "moveChunk.to" => MovePhase::To,
        "moveChunk.commit" => MovePhase::Commit,
        _ => return Ok(None),
    };
    decode_move(doc, phase).map(Some)
}

fn namespace_and_time(doc: &Document) -> Result<(&str, bson::DateTime), DecodeError> {
    let namespace = doc.get_str("ns").context(FieldSnafu { field: "ns" })?;
    let time = doc
        .get_datetime("time")
        .context(FieldSnafu { field: "time" })?;
    Ok((namespace, *time))
}

fn decode_split(doc: &Document) -> Result<ChangeEvent, DecodeError> {
    let (namespace, time) = namespace_and_time(doc)?;
    let details = doc
        .get_document("details")
        .context(FieldSnafu { field: "details" })?;
    Ok(ChangeEvent::Split {
        namespace: namespace.into(),
        time,
        before: decode_spec(details, "before")?,
        left: decode_spec(details, "left")?,
        right: decode_spec(details, "right")?,
    })
}

fn decode_multi_split(doc: &Document) -> Result<ChangeEvent, DecodeError> {
    let (namespace, time) = namespace_and_time(doc)?;
    let details = doc
        .get_document("details")
        .context(FieldSnafu { field: "details" })?;
    Ok(ChangeEvent::MultiSplit {
        namespace: namespace.into(),
        time,
        before: decode_spec(details, "before")?,
        sibling: decode_spec(details, "chunk")?,
    })
}

fn decode_move(doc: &Document, phase: MovePhase) -> Result<ChangeEvent, DecodeError> {
    let (namespace, time) = namespace_and_time(doc)?;
    let details = doc
        .get_document("details")
        .context(FieldSnafu { field: "details" })?;

    let (_, min) = decode_key(details, "min")?;
    let (_, max) = decode_key(details, "max")?;

    // the donor is recorded by the start entry only
    let donor = match phase {
        MovePhase::Start => Some(ShardName::from(
            details
                .get_str("from")
                .context(FieldSnafu { field: "details.from" })?,
        )),
        _ => details.get_str("from").ok().map(ShardName::from),
    };

    let aborted = phase == MovePhase::From
        && details.get_str("note").map(|note| note == "abort").unwrap_or(false);

    Ok(ChangeEvent::Move {
        namespace: namespace.into(),
        time,
        phase,
        range: ChunkRange::new(min, max),
        donor,
        aborted,
    })
}

/// Decode the `before`/`left`/`right`/`chunk` sub-record `which` of a split
/// entry's details.
fn decode_spec(details: &Document, which: &str) -> Result<ChunkSpec, DecodeError> {
    let sub = details.get_document(which).context(FieldSnafu {
        field: format!("details.{which}"),
    })?;

    let (key_fields, min) = decode_key(sub, "min")?;
    let (max_fields, max) = decode_key(sub, "max")?;
    if key_fields != max_fields {
        return KeyFieldsDifferSnafu { field: which }.fail();
    }

    let lastmod = sub.get_timestamp("lastmod").context(FieldSnafu {
        field: format!("details.{which}.lastmod"),
    })?;

    Ok(ChunkSpec {
        key_fields,
        range: ChunkRange::new(min, max),
        version: ShardVersion::from(lastmod),
    })
}

fn decode_key(doc: &Document, which: &str) -> Result<(Vec<String>, ShardKeyTuple), DecodeError> {
    let key_doc = doc.get_document(which).context(FieldSnafu {
        field: which.to_string(),
    })?;
    ShardKeyTuple::from_document(key_doc).context(KeySnafu {
        field: which.to_string(),
    })
}
