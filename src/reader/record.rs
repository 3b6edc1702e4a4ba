//! Synthetic record layout.
//!
//! header · `<revision` carried · `<revision` body · `</page>\n`
//!
//! `header` runs from `<page>` up to (not including) the page's first `<revision`;
//! `carried` is the previous revision's body or the first-of-page placeholder;
//! `body` runs from right after `<revision` through `</revision>`.

use crate::consts::{FIRST_REVISION_PLACEHOLDER, PAGE_FOOTER, REVISION_BEGIN};

/// Previous revision body carried into the next record of the same page.
#[derive(Clone, Debug)]
pub struct CarriedContext {
    body: Vec<u8>,
    placeholder: bool,
}

impl Default for CarriedContext {
    fn default() -> Self {
        Self {
            body: FIRST_REVISION_PLACEHOLDER.to_vec(),
            placeholder: true,
        }
    }
}

impl CarriedContext {
    pub fn reset(&mut self) {
        self.body.clear();
        self.body.extend_from_slice(FIRST_REVISION_PLACEHOLDER);
        self.placeholder = true;
    }

    pub fn carry(&mut self, body: &[u8]) {
        self.body.clear();
        self.body.extend_from_slice(body);
        self.placeholder = false;
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }
}

/// Append one record to `out`.
pub fn assemble_into(out: &mut Vec<u8>, header: &[u8], carried: &CarriedContext, body: &[u8]) {
    let carried = carried.as_bytes();
    out.reserve(header.len() + carried.len() + body.len() + 2 * REVISION_BEGIN.len() + PAGE_FOOTER.len());
    out.extend_from_slice(header);
    out.extend_from_slice(REVISION_BEGIN);
    out.extend_from_slice(carried);
    out.extend_from_slice(REVISION_BEGIN);
    out.extend_from_slice(body);
    out.extend_from_slice(PAGE_FOOTER);
}
