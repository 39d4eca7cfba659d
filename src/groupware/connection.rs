//
// oxsync
//
// Copyright 2026 The oxsync contributors
//
// This file is part of oxsync.
//
// oxsync is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// oxsync is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with oxsync. If not, see <http://www.gnu.org/licenses/>.
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::{Arc, Mutex};

use isahc::{
    config::{Configurable, RedirectPolicy},
    http::StatusCode,
    AsyncReadResponseExt, HttpClient,
};
use serde_json::Value;
use url::Url;

use super::{
    deserialize_from_str,
    objects::SessionInfo,
    protocol::{self, CallResponse, Request},
    GroupwareApi, ResultFuture, ServerError,
};
use crate::{conf::ServerConf, error::*, log, utils::futures::timeout};

/// Value of the `client` login parameter.
pub const CLIENT_ID: &str = "oxsync";

#[derive(Debug)]
pub struct Connection {
    client: Arc<HttpClient>,
    server_conf: ServerConf,
    session: Mutex<Option<SessionInfo>>,
}

impl Connection {
    pub fn new(server_conf: &ServerConf) -> Result<Self> {
        let client = HttpClient::builder()
            .connection_cache_size(8)
            .connection_cache_ttl(std::time::Duration::from_secs(30 * 60))
            .cookies()
            .ssl_options(if server_conf.danger_accept_invalid_certs {
                isahc::config::SslOption::DANGER_ACCEPT_INVALID_CERTS
                    | isahc::config::SslOption::DANGER_ACCEPT_INVALID_HOSTS
                    | isahc::config::SslOption::DANGER_ACCEPT_REVOKED_CERTS
            } else {
                isahc::config::SslOption::NONE
            })
            .redirect_policy(RedirectPolicy::Limit(10))
            .build()?;
        Ok(Self {
            client: Arc::new(client),
            server_conf: server_conf.clone(),
            session: Mutex::new(None),
        })
    }

    pub fn server_conf(&self) -> &ServerConf {
        &self.server_conf
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    /// URL of `{url}{base_path}/{module}`.
    pub fn endpoint(&self, module: &str) -> Result<Url> {
        let mut url = Url::parse(&self.server_conf.url)?;
        let path = format!(
            "{}/{}/{}",
            url.path().trim_end_matches('/'),
            self.server_conf.base_path.trim_matches('/'),
            module
        );
        url.set_path(&path);
        Ok(url)
    }

    fn session_id(&self) -> Result<String> {
        self.session
            .lock()?
            .as_ref()
            .map(|s| s.session.clone())
            .ok_or_else(|| Error::new("Not logged in").set_kind(ErrorKind::Session))
    }

    pub async fn open_session(&self) -> Result<SessionInfo> {
        let mut url = self.endpoint("login")?;
        url.query_pairs_mut().append_pair("action", "login");
        let password = self.server_conf.password()?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("name", &self.server_conf.username)
            .append_pair("password", &password)
            .append_pair("client", CLIENT_ID)
            .finish();
        let request = isahc::Request::post(url.as_str())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.into_bytes())?;
        let res_text = self.send(request).await?;
        if cfg!(feature = "http-trace") {
            log::trace!("open_session(): response {:?}", res_text);
        }
        let value: Value = deserialize_from_str(&res_text)?;
        if value.get("error").is_some() {
            let err: ServerError = deserialize_from_str(&res_text)?;
            return Err(Error::from(err).set_summary(format!(
                "Could not log in to {} as {}",
                self.server_conf.url, self.server_conf.username
            )));
        }
        let info: SessionInfo = deserialize_from_str(&res_text)?;
        *self.session.lock()? = Some(info.clone());
        log::info!(
            "Logged in to {} as {} (user id {})",
            self.server_conf.url,
            self.server_conf.username,
            info.user_id
        );
        Ok(info)
    }

    pub async fn close_session(&self) -> Result<()> {
        let session = self.session.lock()?.take();
        let Some(session) = session else {
            return Ok(());
        };
        let mut url = self.endpoint("login")?;
        url.query_pairs_mut()
            .append_pair("action", "logout")
            .append_pair("session", &session.session);
        let request = isahc::Request::get(url.as_str()).body(Vec::new())?;
        self.send(request).await?;
        log::info!("Logged out of {}", self.server_conf.url);
        Ok(())
    }

    pub async fn send_multiple(&self, request: &Request) -> Result<Vec<CallResponse>> {
        if request.is_empty() {
            return Ok(vec![]);
        }
        let mut url = self.endpoint("multiple")?;
        url.query_pairs_mut()
            .append_pair("session", &self.session_id()?)
            .append_pair("continue", "true");
        let body = serde_json::to_string(request)?;
        if cfg!(feature = "http-trace") {
            log::trace!("send_multiple(): request {}", body);
        }
        let http_request = isahc::Request::put(url.as_str())
            .header("Content-Type", "application/json")
            .body(body.into_bytes())?;
        let res_text = self.send(http_request).await?;
        if cfg!(feature = "http-trace") {
            log::trace!("send_multiple(): response {:?}", res_text);
        }
        protocol::parse_multiple_response(&res_text, request.len())
    }

    async fn send(&self, request: isahc::Request<Vec<u8>>) -> Result<String> {
        let path = request.uri().path().to_string();
        let mut res = timeout(self.server_conf.timeout(), self.client.send_async(request))
            .await?
            .chain_err_summary(|| format!("Could not connect to {}", self.server_conf.url))?;
        let status = res.status();
        if status != StatusCode::OK {
            let kind: NetworkErrorKind = status.into();
            let res_text = res.text().await.unwrap_or_default();
            return Err(Error::new(format!(
                "Request to {} failed: HTTP {} {}",
                path,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            ))
            .set_details(res_text)
            .set_kind(kind.into()));
        }
        Ok(res.text().await?)
    }
}

impl GroupwareApi for Connection {
    fn login(&self) -> ResultFuture<'_, SessionInfo> {
        Box::pin(self.open_session())
    }

    fn logout(&self) -> ResultFuture<'_, ()> {
        Box::pin(self.close_session())
    }

    fn multiple(&self, request: Request) -> ResultFuture<'_, Vec<CallResponse>> {
        Box::pin(async move { self.send_multiple(&request).await })
    }

    fn invalidate_session(&self) {
        if let Ok(mut session) = self.session.lock() {
            *session = None;
        }
    }
}
