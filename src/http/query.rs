//! Query string and cookie pair splitting.

use crate::http::types::Cookies;
use memchr::{memchr, memchr_iter};

/// Splits delimiter-separated `key=value` lists.
///
/// The same rules drive URL query strings (`&`-separated) and `Cookie`
/// headers (`;`-separated):
///
/// - empty segments are skipped;
/// - a segment without `=` is a key with an absent value;
/// - a segment with `=` is split on every `=`, empty fragments are thrown
///   away, and only the first two survivors are used as key and value.
///
/// The last rule means a value that itself contains `=` is truncated, and
/// `=v` yields the key `v` with no value. There is no percent-decoding.
///
/// # Examples
/// ```rust
/// use handoff_web::query::Query;
///
/// let mut params: Vec<(&str, Option<&str>)> = Vec::new();
/// Query::parse_into(&mut params, "flag&a=1&&b=x=y&=v", b'&', false);
///
/// assert_eq!(params, [
///     ("flag", None),
///     ("a", Some("1")),
///     ("b", Some("x")),
///     ("v", None),
/// ]);
/// ```
pub struct Query;

impl Query {
    /// Parses a query string (without the leading `?`) into a new
    /// [`QueryParams`].
    #[inline]
    pub fn parse(query: &str) -> QueryParams {
        let mut result = QueryParams::default();
        Self::parse_into(&mut result, query, b'&', false);
        result
    }

    /// Parses the value of a `Cookie` header.
    #[inline]
    pub fn parse_cookies(value: &str) -> Cookies {
        let mut result = Cookies::default();
        Self::parse_into(&mut result, value, b';', true);
        result
    }

    /// Splits `data` on `separator` and feeds every pair into `result`.
    ///
    /// With `trim` set, segments, keys and values lose surrounding
    /// whitespace and whitespace-only segments are skipped.
    pub fn parse_into<'a, C: QueryCollector<'a>>(
        result: &mut C,
        data: &'a str,
        separator: u8,
        trim: bool,
    ) {
        let bytes = data.as_bytes();
        let mut start = 0;

        let ends = memchr_iter(separator, bytes).chain(std::iter::once(bytes.len()));
        for end in ends {
            let mut segment = &data[start..end];
            start = end + 1;

            if trim {
                segment = segment.trim();
            }
            if segment.is_empty() {
                continue;
            }

            if let Some((key, value)) = Self::split_pair(segment, trim) {
                result.add_param(key, value);
            }
        }
    }

    #[inline]
    fn split_pair(segment: &str, trim: bool) -> Option<(&str, Option<&str>)> {
        if memchr(b'=', segment.as_bytes()).is_none() {
            return Some((segment, None));
        }

        let mut fragments = segment.split('=').filter(|f| !f.is_empty());
        let key = fragments.next()?;
        let value = fragments.next();

        match trim {
            true => {
                let key = key.trim();
                (!key.is_empty()).then(|| (key, value.map(str::trim)))
            }
            false => Some((key, value)),
        }
    }
}

/// A trait for types that can collect parsed parameters.
///
/// # Examples
/// ```rust
/// use handoff_web::query::{Query, QueryCollector};
///
/// struct Keys(Vec<String>);
///
/// impl<'a> QueryCollector<'a> for Keys {
///     fn add_param(&mut self, key: &'a str, _: Option<&'a str>) {
///         self.0.push(key.to_uppercase());
///     }
/// }
///
/// let mut keys = Keys(Vec::new());
/// Query::parse_into(&mut keys, "a=1&b", b'&', false);
/// assert_eq!(keys.0, ["A", "B"]);
/// ```
pub trait QueryCollector<'a> {
    /// Adds a parsed parameter to the collection.
    fn add_param(&mut self, key: &'a str, value: Option<&'a str>);
}

impl<'a> QueryCollector<'a> for Vec<(&'a str, Option<&'a str>)> {
    #[inline(always)]
    fn add_param(&mut self, key: &'a str, value: Option<&'a str>) {
        self.push((key, value));
    }
}

impl<'a> QueryCollector<'a> for QueryParams {
    #[inline(always)]
    fn add_param(&mut self, key: &'a str, value: Option<&'a str>) {
        self.entries
            .push((key.to_string(), value.map(str::to_string)));
    }
}

impl<'a> QueryCollector<'a> for Cookies {
    #[inline(always)]
    fn add_param(&mut self, key: &'a str, value: Option<&'a str>) {
        self.insert(key, value);
    }
}

/// Ordered query multi-map. Duplicate keys are all retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Option<String>)>,
}

impl QueryParams {
    /// First occurrence of `key`: `None` if missing, `Some(None)` if the
    /// parameter carried no value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
