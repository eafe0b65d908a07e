//! Envelope detection for scanned strings and code-locked sessions.

use std::sync::Arc;

use crate::{
    Result,
    TruthError,
    assembler::Assembler,
    envelope::{Envelope, Frame},
    store::AssemblyStatus,
};

/// Parse `raw` with the first candidate envelope that accepts it.
///
/// Candidates are tried in order. When every candidate rejects the string
/// the last candidate's error is returned.
///
/// # Errors
///
/// Returns the last parse error, or [`TruthError::MalformedEnvelope`] when
/// `candidates` is empty.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use truthframe::{
///     classify::classify,
///     envelope::{Envelope, LineEnvelope, TransportKind, UrlEnvelope},
/// };
///
/// let candidates: Vec<Arc<dyn Envelope>> = vec![
///     Arc::new(LineEnvelope::default()),
///     Arc::new(UrlEnvelope::default()),
/// ];
/// let (envelope, frame) = classify("truth://v1/ER/A/1/1?c=xyz", &candidates).expect("url");
/// assert_eq!(envelope.transport_kind(), TransportKind::Url);
/// assert_eq!(frame.fragment, "xyz");
/// ```
pub fn classify(raw: &str, candidates: &[Arc<dyn Envelope>]) -> Result<(Arc<dyn Envelope>, Frame)> {
    let mut last_error = TruthError::malformed("no candidate envelopes");
    for candidate in candidates {
        match candidate.parse(raw) {
            Ok(frame) => return Ok((Arc::clone(candidate), frame)),
            Err(err) => last_error = err,
        }
    }
    Err(last_error)
}

/// Ingest session bound to a single code.
///
/// The code is either fixed up front or taken from the first frame that
/// parses. Frames for any other code are rejected with
/// [`TruthError::CodeMismatch`] before they reach the store. Every failure
/// is also kept in [`errors`](Self::errors).
#[derive(Debug)]
pub struct ClassifySession<'a> {
    assembler: &'a Assembler,
    code: Option<String>,
    last_status: Option<AssemblyStatus>,
    errors: Vec<TruthError>,
}

impl<'a> ClassifySession<'a> {
    /// Session that locks to the first code it sees.
    #[must_use]
    pub fn new(assembler: &'a Assembler) -> Self {
        Self {
            assembler,
            code: None,
            last_status: None,
            errors: Vec::new(),
        }
    }

    /// Session locked to `code` from the start.
    #[must_use]
    pub fn for_code(assembler: &'a Assembler, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::new(assembler)
        }
    }

    /// Code this session is locked to, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> { self.code.as_deref() }

    /// Failures recorded so far, oldest first.
    #[must_use]
    pub fn errors(&self) -> &[TruthError] { &self.errors }

    /// Classify, check and ingest one scanned string.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::CodeMismatch`] for a foreign code, or any
    /// parse or store error. The error is also recorded in
    /// [`errors`](Self::errors).
    pub fn add_line(&mut self, raw: &str) -> Result<AssemblyStatus> {
        let result = self.try_add_line(raw);
        if let Err(err) = &result {
            self.errors.push(err.clone());
        }
        result
    }

    fn try_add_line(&mut self, raw: &str) -> Result<AssemblyStatus> {
        let frame = self.assembler.parse_line(raw)?;
        match &self.code {
            Some(expected) if *expected != frame.code => {
                log::warn!("rejected frame for {} in session for {expected}", frame.code);
                return Err(TruthError::CodeMismatch {
                    expected: expected.clone(),
                    found: frame.code,
                });
            }
            Some(_) => {}
            None => self.code = Some(frame.code.clone()),
        }
        let status = self.assembler.ingest_frame(&frame)?;
        self.last_status = Some(status.clone());
        Ok(status)
    }

    /// Ingest every line, continuing past failures.
    ///
    /// Returns the status after the last successful line, or the previous
    /// status when none succeeded.
    pub fn add_lines<I, S>(&mut self, lines: I) -> Option<AssemblyStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            // Failures are kept in `errors`.
            let _ = self.add_line(line.as_ref());
        }
        self.last_status.clone()
    }

    /// Fresh status from the store, falling back to the last one seen.
    #[must_use]
    pub fn status(&self) -> Option<AssemblyStatus> {
        self.code
            .as_deref()
            .and_then(|code| self.assembler.status(code).ok().flatten())
            .or_else(|| self.last_status.clone())
    }

    /// True once the locked code is complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| self.assembler.is_complete(code).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::{ClassifySession, classify};
    use crate::{
        TruthError,
        assembler::Assembler,
        envelope::{Envelope, LineEnvelope, TransportKind, UrlEnvelope},
        serializer::JsonSerializer,
        store::MemoryStore,
        transport::IdentityTransport,
    };

    fn candidates() -> Vec<Arc<dyn Envelope>> {
        vec![
            Arc::new(LineEnvelope::default()),
            Arc::new(UrlEnvelope::default()),
        ]
    }

    fn assembler() -> Assembler {
        Assembler::new(
            Arc::new(MemoryStore::new()),
            Arc::new(JsonSerializer),
            Arc::new(IdentityTransport),
            candidates(),
        )
    }

    #[rstest]
    #[case("ER|v1|A|1/2|{\"a\"", TransportKind::Line)]
    #[case("truth://v1/ER/A/1/2?c=x", TransportKind::Url)]
    #[case("https://h/?truth=v1&prefix=ER&code=A&i=1&n=2&c=x", TransportKind::Url)]
    fn picks_the_matching_syntax(#[case] raw: &str, #[case] kind: TransportKind) {
        let (envelope, frame) = classify(raw, &candidates()).expect("classify");
        assert_eq!(envelope.transport_kind(), kind);
        assert_eq!(frame.code, "A");
    }

    #[test]
    fn propagates_the_last_error() {
        let err = classify("ER|v1|A|0/2|x", &candidates()).expect_err("invalid");
        assert!(matches!(err, TruthError::MalformedEnvelope { .. }), "{err:?}");

        let only_line: Vec<Arc<dyn Envelope>> = vec![Arc::new(LineEnvelope::default())];
        assert_eq!(
            classify("ER|v1|A|0/2|x", &only_line).expect_err("invalid"),
            TruthError::InvalidIndexTotal { index: 0, total: 2 }
        );
    }

    #[test]
    fn empty_candidates_are_malformed() {
        assert!(matches!(
            classify("anything", &[]),
            Err(TruthError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn session_locks_to_the_first_code() {
        let assembler = assembler();
        let mut session = ClassifySession::new(&assembler);
        session.add_line("ER|v1|A|1/2|{\"a\"").expect("first");
        assert_eq!(session.code(), Some("A"));

        let err = session.add_line("ER|v1|B|1/1|{}").expect_err("foreign");
        assert_eq!(
            err,
            TruthError::CodeMismatch {
                expected: "A".into(),
                found: "B".into(),
            }
        );
        assert_eq!(assembler.status("B").expect("status"), None);
        assert_eq!(session.errors(), [err]);
    }

    #[test]
    fn add_lines_continues_past_failures() {
        let assembler = assembler();
        let mut session = ClassifySession::for_code(&assembler, "A");
        let status = session
            .add_lines(["ER|v1|A|2/2|:1}", "garbage", "ER|v1|B|1/1|{}", "ER|v1|A|1/2|{\"a\""])
            .expect("status");
        assert!(status.complete);
        assert!(session.is_complete());
        assert_eq!(session.errors().len(), 2);
        assert_eq!(session.status().map(|s| s.received), Some(2));
    }
}
