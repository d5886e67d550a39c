use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

use crate::auth::{AuthParams, AuthToken, Authenticator};
use crate::config::load_config;
use crate::error::Error;
use crate::feed::{
    FeedInfo, ReceiveOptions, Rows, SheetRef, WorksheetMetadata, extract_cells, extract_metadata,
    extract_sheet_refs,
};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Query, Transport};
use crate::util::{DEFAULT_HOST, feed_url, is_atom_content_type, non_empty};
use crate::xml::{self, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Everything [`Spreadsheet::create`] needs to resolve a worksheet.
#[derive(Clone, Default)]
pub struct SpreadsheetOptions {
    pub auth: Option<Arc<dyn Authenticator>>,
    pub spreadsheet_id: Option<String>,
    /// Looked up through the spreadsheets feed when no id is given.
    pub spreadsheet_name: Option<String>,
    pub worksheet_id: Option<String>,
    /// Looked up through the worksheets feed when no id is given.
    pub worksheet_name: Option<String>,
    /// Defaults to `true`.
    pub use_cell_text_values: Option<bool>,
    /// Defaults to `true`.
    pub use_https: Option<bool>,
    /// Defaults to `spreadsheets.google.com`.
    pub host: Option<String>,
    /// Defaults to an [`HttpTransport`].
    pub transport: Option<Arc<dyn Transport>>,
}

impl SpreadsheetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from the environment and/or `.sheetfeedrc`.
    pub fn from_env() -> anyhow::Result<Self> {
        load_config()
    }

    pub fn with_auth(mut self, auth: impl Authenticator + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    pub fn with_access_token(self, token: AuthToken) -> Self {
        self.with_auth(token)
    }

    pub fn with_spreadsheet_id(mut self, id: impl Into<String>) -> Self {
        self.spreadsheet_id = Some(id.into());
        self
    }

    pub fn with_spreadsheet_name(mut self, name: impl Into<String>) -> Self {
        self.spreadsheet_name = Some(name.into());
        self
    }

    pub fn with_worksheet_id(mut self, id: impl Into<String>) -> Self {
        self.worksheet_id = Some(id.into());
        self
    }

    pub fn with_worksheet_name(mut self, name: impl Into<String>) -> Self {
        self.worksheet_name = Some(name.into());
        self
    }

    pub fn with_cell_text_values(mut self, use_cell_text_values: bool) -> Self {
        self.use_cell_text_values = Some(use_cell_text_values);
        self
    }

    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = Some(use_https);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }
}

impl fmt::Debug for SpreadsheetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpreadsheetOptions")
            .field("auth", &self.auth.is_some())
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("spreadsheet_name", &self.spreadsheet_name)
            .field("worksheet_id", &self.worksheet_id)
            .field("worksheet_name", &self.worksheet_name)
            .field("use_cell_text_values", &self.use_cell_text_values)
            .field("use_https", &self.use_https)
            .field("host", &self.host)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

/// A single feed request. An empty `url` is rejected before anything is sent.
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions<'a> {
    pub url: &'a str,
    pub query: Option<&'a Query>,
}

impl<'a> RequestOptions<'a> {
    pub fn new(url: &'a str) -> Self {
        Self { url, query: None }
    }

    pub fn with_query(mut self, query: &'a Query) -> Self {
        self.query = Some(query);
        self
    }
}

/// A resolved worksheet plus the credential used to read it.
///
/// Only the access token changes after [`Spreadsheet::create`]: it is
/// replaced in place when a request is answered with `401 Unauthorized` and
/// re-authentication succeeds. Requests take `&mut self`, so one handle
/// serves one caller at a time; share it across threads behind a `Mutex`.
pub struct Spreadsheet {
    spreadsheet_id: String,
    worksheet_id: String,
    protocol: Protocol,
    host: String,
    use_cell_text_values: bool,
    auth_token: AuthToken,

    auth: Arc<dyn Authenticator>,
    transport: Arc<dyn Transport>,
}

impl Spreadsheet {
    /// Creates a spreadsheet handle using environment variables and/or `.sheetfeedrc`.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::create(SpreadsheetOptions::from_env()?)?)
    }

    /// Validates `options`, obtains an access token and resolves any
    /// spreadsheet/worksheet given by name.
    ///
    /// Missing options are reported before any network activity.
    pub fn create(options: SpreadsheetOptions) -> Result<Self, Error> {
        let auth = options
            .auth
            .ok_or_else(|| Error::config("Missing authentication information"))?;

        let spreadsheet_id = non_empty(options.spreadsheet_id);
        let spreadsheet_name = non_empty(options.spreadsheet_name);
        if spreadsheet_id.is_none() && spreadsheet_name.is_none() {
            return Err(Error::config("Missing 'spreadsheetId' or 'spreadsheetName'"));
        }

        let worksheet_id = non_empty(options.worksheet_id);
        let worksheet_name = non_empty(options.worksheet_name);
        if worksheet_id.is_none() && worksheet_name.is_none() {
            return Err(Error::config("Missing 'worksheetId' or 'worksheetName'"));
        }

        let protocol = if options.use_https.unwrap_or(true) {
            Protocol::Https
        } else {
            Protocol::Http
        };
        let transport: Arc<dyn Transport> = match options.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };

        let mut sheet = Spreadsheet {
            spreadsheet_id: spreadsheet_id.unwrap_or_default(),
            worksheet_id: worksheet_id.unwrap_or_default(),
            protocol,
            host: non_empty(options.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            use_cell_text_values: options.use_cell_text_values.unwrap_or(true),
            auth_token: AuthToken::new("", ""),
            auth,
            transport,
        };

        sheet.auth_token = sheet.auth.authenticate(&sheet.auth_params())?;

        if sheet.spreadsheet_id.is_empty() {
            let name = spreadsheet_name.unwrap_or_default();
            sheet.spreadsheet_id = find_by_title(sheet.list_spreadsheets()?, &name)
                .ok_or_else(|| Error::config(format!("Spreadsheet '{}' not found", name)))?;
            log::debug!("spreadsheet '{}' resolved to {}", name, sheet.spreadsheet_id);
        }

        if sheet.worksheet_id.is_empty() {
            let name = worksheet_name.unwrap_or_default();
            sheet.worksheet_id = find_by_title(sheet.list_worksheets()?, &name)
                .ok_or_else(|| Error::config(format!("Worksheet '{}' not found", name)))?;
            log::debug!("worksheet '{}' resolved to {}", name, sheet.worksheet_id);
        }

        Ok(sheet)
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn worksheet_id(&self) -> &str {
        &self.worksheet_id
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn use_cell_text_values(&self) -> bool {
        self.use_cell_text_values
    }

    /// The token the next request will present.
    pub fn auth_token(&self) -> &AuthToken {
        &self.auth_token
    }

    /// Performs one GET against the feed service and parses the XML answer.
    ///
    /// A `401 Unauthorized` answer triggers exactly one re-authentication and
    /// one retry of the same request; every other failure is returned as is.
    pub fn request(&mut self, options: RequestOptions<'_>) -> Result<Value, Error> {
        if options.url.is_empty() {
            return Err(Error::MissingUrl);
        }

        let mut reauthenticated = false;
        loop {
            let request = self.build_request(&options)?;
            log::debug!("GET {}", options.url);

            let response = match self.transport.send(&request) {
                Ok(Some(resp)) => resp,
                Ok(None) => return Err(Error::NoResponse),
                Err(e) => return Err(Error::Transport(e)),
            };

            if response.status == StatusCode::UNAUTHORIZED && !reauthenticated {
                log::info!("{} answered 401, re-authenticating", options.url);
                self.auth_token = self
                    .auth
                    .authenticate(&self.auth_params())
                    .inspect_err(|e| log::warn!("re-authentication failed: {}", e))?;
                reauthenticated = true;
                continue;
            }

            return parse_response(response);
        }
    }

    /// Reads every non-empty cell of the worksheet.
    ///
    /// `query` is handed to the transport untouched (e.g. `min-row`, `max-col`).
    pub fn receive(
        &mut self,
        options: &ReceiveOptions,
        query: Option<&Query>,
    ) -> Result<(Rows, FeedInfo), Error> {
        let url = self.cells_url();
        let document = self.request(RequestOptions { url: &url, query })?;
        extract_cells(
            &document,
            &self.spreadsheet_id,
            &self.worksheet_id,
            options,
            self.use_cell_text_values,
        )
    }

    /// Title, last update and dimensions of the worksheet.
    pub fn metadata(&mut self) -> Result<WorksheetMetadata, Error> {
        let url = feed_url(
            self.protocol,
            &self.host,
            &[
                "worksheets",
                &self.spreadsheet_id,
                "private",
                "full",
                &self.worksheet_id,
            ],
        );
        let document = self.request(RequestOptions::new(&url))?;
        extract_metadata(&document)
    }

    /// Spreadsheets visible to the current credential.
    pub fn list_spreadsheets(&mut self) -> Result<Vec<SheetRef>, Error> {
        let url = feed_url(self.protocol, &self.host, &["spreadsheets", "private", "full"]);
        let document = self.request(RequestOptions::new(&url))?;
        extract_sheet_refs(&document)
    }

    /// Worksheets of the current spreadsheet.
    pub fn list_worksheets(&mut self) -> Result<Vec<SheetRef>, Error> {
        let url = feed_url(
            self.protocol,
            &self.host,
            &["worksheets", &self.spreadsheet_id, "private", "full"],
        );
        let document = self.request(RequestOptions::new(&url))?;
        extract_sheet_refs(&document)
    }

    fn cells_url(&self) -> String {
        feed_url(
            self.protocol,
            &self.host,
            &[
                "cells",
                &self.spreadsheet_id,
                &self.worksheet_id,
                "private",
                "full",
            ],
        )
    }

    fn auth_params(&self) -> AuthParams {
        AuthParams {
            spreadsheet_id: Some(self.spreadsheet_id.clone()).filter(|s| !s.is_empty()),
            worksheet_id: Some(self.worksheet_id.clone()).filter(|s| !s.is_empty()),
            use_cell_text_values: self.use_cell_text_values,
            use_https: self.protocol == Protocol::Https,
        }
    }

    fn build_request<'a>(&self, options: &RequestOptions<'a>) -> Result<HttpRequest<'a>, Error> {
        let mut headers = HeaderMap::new();
        let authorization = HeaderValue::from_str(&self.auth_token.header_value())
            .map_err(|_| Error::Auth("access token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(
            HeaderName::from_static("gdata-version"),
            HeaderValue::from_static("3.0"),
        );

        Ok(HttpRequest {
            url: options.url,
            headers,
            query: options.query,
        })
    }
}

impl fmt::Debug for Spreadsheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spreadsheet")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("worksheet_id", &self.worksheet_id)
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("use_cell_text_values", &self.use_cell_text_values)
            .finish_non_exhaustive()
    }
}

/// Classifies a response that was not handled as a 401 retry.
fn parse_response(response: HttpResponse) -> Result<Value, Error> {
    let code = response.status.as_u16();
    if code >= 400 {
        return Err(Error::Server {
            code,
            body: response.body,
        });
    }

    if !response.content_type().is_some_and(is_atom_content_type) {
        return Err(Error::UnexpectedContentType {
            content_type: response.content_type().map(str::to_string),
            body: response.body,
        });
    }

    xml::parse(&response.body)
}

fn find_by_title(sheets: Vec<SheetRef>, title: &str) -> Option<String> {
    sheets.into_iter().find(|s| s.title == title).map(|s| s.id)
}
