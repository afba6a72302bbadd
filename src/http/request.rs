use crate::{
    errors::ErrorKind,
    http::{
        endpoint::Endpoint,
        types::{Cookies, Headers},
    },
    query::{Query, QueryParams},
    Method,
};
use memchr::{memchr, memchr_iter};
use url::Url;

/// A parsed HTTP request header.
///
/// Built once per connection from the framed header block and never
/// changed afterwards. The body, if any, is still on the stream; see
/// [`Context::read_body`](crate::Context::read_body).
///
/// # Input
///
/// Lines may end with `CRLF` or a bare `LF`; blank lines are skipped.
///
/// ## First line
/// ```text
/// [METHOD] SP [TARGET] SP [VERSION]
/// ```
/// At least three space-separated fields are required, extra fields are
/// ignored. `[METHOD]` is matched case-insensitively against
/// [Method](crate::Method). `[TARGET]` is either an absolute URL or an
/// absolute path, optionally followed by `?` and a query string.
///
/// ## Header
/// ```text
/// [NAME] ":" [VALUE]
/// ```
/// Name and value are trimmed. **A line containing more than one `:` is
/// ignored entirely**, so a header such as `Referer: http://a/b` or
/// `Host: example.com:8080` never reaches the request. Lines with an
/// empty name are ignored as well.
///
/// All accepted lines are kept in [`headers`](Request::headers). These
/// are also interpreted:
///
/// | Header            | Field                                        |
/// |-------------------|----------------------------------------------|
/// | `Accept`          | [`accept_types`](Request::accept_types)      |
/// | `Accept-Language` | [`user_languages`](Request::user_languages)  |
/// | `Cookie`          | [`cookies`](Request::cookies)                |
/// | `User-Agent`      | [`user_agent`](Request::user_agent)          |
/// | `Referer`         | [`referrer`](Request::referrer)              |
/// | `Content-Length`  | [`content_length`](Request::content_length)  |
/// | `Content-Type`    | [`content_type`](Request::content_type)      |
/// | `Host`            | base of [`url`](Request::url)                |
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    url: Url,
    raw_target: String,
    version: String,

    query: QueryParams,
    headers: Headers,

    content_length: u64,
    content_type: Option<String>,
    accept_types: Vec<String>,
    user_languages: Vec<String>,
    cookies: Cookies,
    user_agent: Option<String>,
    referrer: Option<Url>,

    remote: Endpoint,
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Full request URL. Origin-form targets are resolved against the
    /// `Host` header, or `localhost` without one.
    #[inline(always)]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[inline(always)]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Request target exactly as it appeared on the request line.
    #[inline(always)]
    pub fn raw_target(&self) -> &str {
        &self.raw_target
    }

    /// Protocol field of the request line, e.g. `HTTP/1.1`. Not validated.
    #[inline(always)]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[inline(always)]
    pub const fn query(&self) -> &QueryParams {
        &self.query
    }

    #[inline(always)]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the first header value with case-insensitive name matching.
    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Declared body length, `0` without a `Content-Length` header.
    #[inline(always)]
    pub const fn content_length(&self) -> u64 {
        self.content_length
    }

    #[inline(always)]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[inline(always)]
    pub fn accept_types(&self) -> &[String] {
        &self.accept_types
    }

    #[inline(always)]
    pub fn user_languages(&self) -> &[String] {
        &self.user_languages
    }

    #[inline(always)]
    pub const fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    #[inline(always)]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    #[inline(always)]
    pub const fn referrer(&self) -> Option<&Url> {
        self.referrer.as_ref()
    }

    #[inline(always)]
    pub const fn remote(&self) -> &Endpoint {
        &self.remote
    }
}

impl Request {
    /// Parses a framed header block received from `remote`.
    ///
    /// # Errors
    /// - [`MalformedRequestLine`](ErrorKind::MalformedRequestLine): fewer
    ///   than three fields, or a target that is not a URL
    /// - [`UnsupportedMethod`](ErrorKind::UnsupportedMethod)
    /// - [`MalformedHeaderValue`](ErrorKind::MalformedHeaderValue): bad
    ///   `Content-Length` or `Referer`
    pub fn parse(header: &str, remote: Endpoint) -> Result<Self, ErrorKind> {
        let mut lines = Self::lines(header);

        let first_line = lines.next().ok_or(ErrorKind::MalformedRequestLine)?;
        let (method, target, version) = Self::parse_request_line(first_line)?;

        let mut headers = Headers::default();
        for line in lines {
            Self::parse_header_line(&mut headers, line);
        }

        let mut request = Request {
            method,
            url: Self::parse_target(target, headers.get("host"))?,
            raw_target: target.to_string(),
            version: version.to_string(),

            query: Self::parse_query(target),
            headers: Headers::default(),

            content_length: 0,
            content_type: None,
            accept_types: Vec::new(),
            user_languages: Vec::new(),
            cookies: Cookies::default(),
            user_agent: None,
            referrer: None,

            remote,
        };

        for (name, value) in headers.iter() {
            request.apply_header(name, value)?;
        }
        request.headers = headers;

        Ok(request)
    }

    #[inline]
    fn lines(header: &str) -> impl Iterator<Item = &str> {
        let bytes = header.as_bytes();
        let mut start = 0;

        memchr_iter(b'\n', bytes)
            .chain(std::iter::once(bytes.len()))
            .map(move |end| {
                let line = &header[start..end];
                start = end + 1;
                line.strip_suffix('\r').unwrap_or(line)
            })
            .filter(|line| !line.is_empty())
    }
}

// Parse first line
impl Request {
    #[inline]
    fn parse_request_line(line: &str) -> Result<(Method, &str, &str), ErrorKind> {
        let line = line.trim_matches(|c: char| c.is_whitespace() || c == '\0');

        let mut fields = line.split(' ');
        let (Some(method), Some(target), Some(version)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(ErrorKind::MalformedRequestLine);
        };

        Ok((Method::from_token(method)?, target, version))
    }

    fn parse_target(target: &str, host: Option<&str>) -> Result<Url, ErrorKind> {
        if !target.starts_with('/') {
            return Url::parse(target).map_err(|_| ErrorKind::MalformedRequestLine);
        }

        let mut url = host
            .and_then(Self::host_base)
            .map_or_else(|| Url::parse("http://localhost/"), Ok)
            .map_err(|_| ErrorKind::MalformedRequestLine)?;

        match target.split_once('?') {
            Some((path, query)) => {
                url.set_path(path);
                url.set_query(Some(query));
            }
            None => url.set_path(target),
        }

        Ok(url)
    }

    /// `http://<host>/` if `host` is a bare authority. Userinfo, a path,
    /// a query or a fragment smuggled into `Host` disqualify it.
    fn host_base(host: &str) -> Option<Url> {
        let url = Url::parse(&format!("http://{host}/")).ok()?;

        let bare = url.username().is_empty()
            && url.password().is_none()
            && url.path() == "/"
            && url.query().is_none()
            && url.fragment().is_none();

        bare.then_some(url)
    }

    #[inline]
    fn parse_query(target: &str) -> QueryParams {
        match memchr(b'?', target.as_bytes()) {
            Some(pos) => Query::parse(target[pos..].trim_start_matches('?')),
            None => QueryParams::default(),
        }
    }
}

// Parse headers
impl Request {
    #[inline]
    fn parse_header_line(headers: &mut Headers, line: &str) {
        if memchr_iter(b':', line.as_bytes()).count() != 1 {
            return;
        }
        let Some((name, value)) = line.split_once(':') else {
            return;
        };

        let (name, value) = (name.trim(), value.trim());
        if !name.is_empty() {
            headers.push(name, value);
        }
    }

    fn apply_header(&mut self, name: &str, value: &str) -> Result<(), ErrorKind> {
        let malformed = || ErrorKind::MalformedHeaderValue {
            name: name.to_string(),
            value: value.to_string(),
        };

        match name.to_ascii_lowercase().as_str() {
            "accept" if !value.is_empty() => self.accept_types = Self::split_list(value),
            "accept-language" if !value.is_empty() => {
                self.user_languages = Self::split_list(value)
            }
            "cookie" => Query::parse_into(&mut self.cookies, value, b';', true),
            "user-agent" => self.user_agent = Some(value.to_string()),
            "referer" if !value.is_empty() => {
                if !Self::is_uri_reference(value) {
                    return Err(malformed());
                }

                let referrer = Url::options()
                    .base_url(Some(&self.url))
                    .parse(value)
                    .map_err(|_| malformed())?;

                self.referrer = Some(referrer);
            }
            "content-length" => self.content_length = value.parse().map_err(|_| malformed())?,
            "content-type" => self.content_type = Some(value.to_string()),
            _ => {}
        }

        Ok(())
    }

    /// Only characters RFC 3986 allows in a URI reference, with every `%`
    /// starting a two-digit hex escape.
    fn is_uri_reference(value: &str) -> bool {
        let bytes = value.as_bytes();

        bytes.iter().enumerate().all(|(i, &b)| match b {
            b'%' => bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)),
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => true,
            _ => b"-._~:/?#[]@!$&'()*+,;=".contains(&b),
        })
    }

    #[inline]
    fn split_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    }
}
