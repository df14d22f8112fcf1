//! # Appraisal (Faculty Performance Appraisal Forms)
//!
//! `appraisal` is the HTTP API behind the faculty performance appraisal form.
//! Faculty members fill a multi-section form, save it section by section and
//! finally submit it. A webmaster identity grants admin rights to other users.
//!
//! ## Forms
//!
//! Each faculty member owns exactly one form record, keyed by email.
//!
//! - **Sections:** the form is split into a closed set of sections
//!   ([`forms::FormSection`]). Saving a section records it in
//!   `completedSteps` (first-save order) and replaces its content.
//! - **Final submit:** flags the record as final. Later section saves are
//!   refused with `409 Conflict`; repeating the final submit is harmless.
//!
//! ## Sessions & Admins
//!
//! Sessions are issued by an external auth provider. This service only
//! resolves a presented token (bearer header or `appraisal_session` cookie)
//! into an email. The webmaster is always an admin and is the only identity
//! allowed to grant admin rights; granted admins are stored in `admins`.

pub mod api;
pub mod cli;
pub mod forms;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
