//! Format validation for delimited submission files.
//!
//! A [`SubmissionFormat`] is a stateless composition of rules:
//! 1. the first record must equal the expected header exactly (case-sensitive);
//! 2. every following record must have as many fields as the header;
//! 3. every record of the right length must pass each record rule.
//!
//! Validation never stops at the first problem. Every problem found is
//! reported with its 1-based line number so a participant can fix the whole
//! file in one go.
//!
//! Fields may be double-quoted; a quoted field may contain the delimiter,
//! line breaks, and `""` for a literal quote. A record spanning lines is
//! reported at the line it starts on. Blank lines outside quotes are skipped
//! and `\r\n` endings are accepted.

use super::error::{FormatProblem, ProblemKind};

/// Column names of a submission file (and of an answer-key file).
pub const ANSWER_HEADER: [&str; 2] = ["id", "result"];

/// A rule applied to a record whose length matches the header.
///
/// Receives the header and the record's fields; returns a message when the
/// record is invalid.
pub type RecordRule = fn(&[String], &[String]) -> Option<String>;

/// A validated data record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number in the source text
    pub line: usize,
    pub fields: Vec<String>,
}

/// Expected shape of a delimited file.
#[derive(Debug, Clone)]
pub struct SubmissionFormat {
    header: Vec<String>,
    delimiter: char,
    record_rules: Vec<RecordRule>,
}

impl SubmissionFormat {
    /// A format with the given header, comma delimiter and no record rules.
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|c| c.to_string()).collect(),
            delimiter: ',',
            record_rules: Vec::new(),
        }
    }

    /// The `id,result` answer format: two fields, neither blank.
    pub fn answers() -> Self {
        Self::new(&ANSWER_HEADER).with_record_rule(non_empty_fields)
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_record_rule(mut self, rule: RecordRule) -> Self {
        self.record_rules.push(rule);
        self
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Validate raw bytes, reporting non-UTF-8 input as an `Encoding` problem.
    pub fn validate_bytes(&self, content: &[u8]) -> Result<Vec<Record>, Vec<FormatProblem>> {
        match std::str::from_utf8(content) {
            Ok(text) => self.validate(text),
            Err(e) => {
                let valid = &content[..e.valid_up_to()];
                let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
                Err(vec![FormatProblem::new(
                    line,
                    ProblemKind::Encoding {
                        message: format!("invalid byte sequence at offset {}", e.valid_up_to()),
                    },
                )])
            }
        }
    }

    /// Validate text and return the data records (header excluded).
    ///
    /// # Errors
    ///
    /// Returns every [`FormatProblem`] found; the list is never empty.
    pub fn validate(&self, text: &str) -> Result<Vec<Record>, Vec<FormatProblem>> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut problems = Vec::new();
        let mut records = Vec::new();
        let mut header_seen = false;

        let mut splitter = RecordSplitter::new(self.delimiter);
        let mut start = 0;

        for (idx, raw) in text.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if !splitter.in_quotes() {
                if line.is_empty() {
                    continue;
                }
                start = idx + 1;
            }
            let Some(fields) = splitter.feed(line) else {
                continue;
            };
            let line_no = start;

            if !header_seen {
                header_seen = true;
                if fields != self.header {
                    problems.push(self.header_mismatch(line_no, fields));
                }
                continue;
            }

            if fields.len() != self.header.len() {
                problems.push(FormatProblem::new(
                    line_no,
                    ProblemKind::RecordLengthMismatch {
                        expected: self.header.len(),
                        found: fields.len(),
                    },
                ));
                continue;
            }

            let mut record_ok = true;
            for rule in &self.record_rules {
                if let Some(message) = rule(&self.header, &fields) {
                    problems.push(FormatProblem::new(
                        line_no,
                        ProblemKind::InvalidRecord { message },
                    ));
                    record_ok = false;
                }
            }
            if record_ok {
                records.push(Record {
                    line: line_no,
                    fields,
                });
            }
        }

        if splitter.in_quotes() {
            problems.push(FormatProblem::new(start, ProblemKind::UnterminatedQuote));
            header_seen = true;
        }
        if !header_seen {
            problems.push(self.header_mismatch(1, Vec::new()));
        }

        if problems.is_empty() {
            Ok(records)
        } else {
            Err(problems)
        }
    }

    fn header_mismatch(&self, line: usize, found: Vec<String>) -> FormatProblem {
        FormatProblem::new(
            line,
            ProblemKind::HeaderMismatch {
                expected: self.header.clone(),
                found,
            },
        )
    }
}

/// Record rule: every field must be non-empty after trimming.
pub fn non_empty_fields(header: &[String], fields: &[String]) -> Option<String> {
    let empty: Vec<String> = fields
        .iter()
        .zip(header)
        .filter(|(value, _)| value.trim().is_empty())
        .map(|(_, column)| format!("`{column}`"))
        .collect();
    if empty.is_empty() {
        None
    } else {
        Some(format!("empty value for {}", empty.join(", ")))
    }
}

/// Splits records fed one line at a time, honouring double quotes.
///
/// A quote opens a quoted field only at the start of a field; elsewhere it
/// is literal text. A line ending inside quotes continues the field on the
/// next line.
struct RecordSplitter {
    delimiter: char,
    fields: Vec<String>,
    field: String,
    in_quotes: bool,
    quoted: bool,
}

impl RecordSplitter {
    fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            fields: Vec::new(),
            field: String::new(),
            in_quotes: false,
            quoted: false,
        }
    }

    fn in_quotes(&self) -> bool {
        self.in_quotes
    }

    /// Returns the record's fields once its last line has been fed.
    fn feed(&mut self, line: &str) -> Option<Vec<String>> {
        if self.in_quotes {
            self.field.push('\n');
        }
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if self.in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        self.field.push('"');
                        chars.next();
                    } else {
                        self.in_quotes = false;
                    }
                } else {
                    self.field.push(c);
                }
            } else if c == '"' && self.field.is_empty() && !self.quoted {
                self.in_quotes = true;
                self.quoted = true;
            } else if c == self.delimiter {
                self.fields.push(std::mem::take(&mut self.field));
                self.quoted = false;
            } else {
                self.field.push(c);
            }
        }

        if self.in_quotes {
            return None;
        }
        let mut fields = std::mem::take(&mut self.fields);
        fields.push(std::mem::take(&mut self.field));
        self.quoted = false;
        Some(fields)
    }
}
