//! Page containers: offset pages with totals and keyset (cursor) pages.

use serde::{Deserialize, Serialize};

use crate::{Error, OrderBy, SortDir};

/// Zero-based page index plus a strictly positive page size.
///
/// An optional sort overrides the order carried by the query it is paired
/// with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    size: u64,
    sort: OrderBy,
}

impl PageRequest {
    /// # Errors
    /// `InvalidArgument` when `size` is zero.
    pub fn of(page: u64, size: u64) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::invalid_argument("page size must be greater than zero"));
        }
        Ok(Self {
            page,
            size,
            sort: OrderBy::empty(),
        })
    }

    /// Build from signed inputs as they arrive from outer layers.
    ///
    /// # Errors
    /// `InvalidArgument` for a negative index or a non-positive size.
    pub fn try_from_signed(page: i64, size: i64) -> Result<Self, Error> {
        let page = u64::try_from(page)
            .map_err(|_| Error::invalid_argument(format!("page index must be >= 0, got {page}")))?;
        let size = u64::try_from(size)
            .map_err(|_| Error::invalid_argument(format!("page size must be > 0, got {size}")))?;
        Self::of(page, size)
    }

    #[must_use]
    pub fn with_sort(mut self, sort: OrderBy) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn sorted_by(mut self, field: impl Into<String>, dir: SortDir) -> Self {
        self.sort = std::mem::take(&mut self.sort).then(field, dir);
        self
    }

    #[must_use]
    pub fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn sort(&self) -> &OrderBy {
        &self.sort
    }

    /// Row offset of the first element, `page * size`.
    ///
    /// # Errors
    /// `InvalidArgument` when the product overflows.
    pub fn offset(&self) -> Result<u64, Error> {
        self.page
            .checked_mul(self.size)
            .ok_or_else(|| Error::invalid_argument("page offset overflows"))
    }

    #[must_use]
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn previous_or_first(&self) -> Self {
        Self {
            page: self.page.saturating_sub(1),
            ..self.clone()
        }
    }
}

/// One window of an ordered result with the total it was cut from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub number: u64,
    pub size: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            total_elements,
            number: request.page(),
            size: request.size(),
        }
    }

    #[must_use]
    pub fn empty(request: &PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    /// `ceil(total_elements / size)`
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total_elements.div_ceil(self.size)
        }
    }

    #[must_use]
    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.number.saturating_add(1) < self.total_pages()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    /// Convert the content, keeping all page metadata.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            number: self.number,
            size: self.size,
        }
    }

    /// Fallible [`Page::map`].
    ///
    /// # Errors
    /// The first error returned by `f`.
    pub fn try_map<U, E, F: FnMut(T) -> Result<U, E>>(self, f: F) -> Result<Page<U>, E> {
        Ok(Page {
            content: self.content.into_iter().map(f).collect::<Result<_, _>>()?,
            total_elements: self.total_elements,
            number: self.number,
            size: self.size,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub limit: u64,
}

/// Keyset page: no total, only opaque cursors to the neighbours.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> CursorPage<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            page_info: self.page_info,
        }
    }
}
