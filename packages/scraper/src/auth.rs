//! Two-step form login.
//!
//! GET the login page, overwrite the username/password controls in the
//! extracted field set, POST it back, then classify the result.
//!
//! The application answers a rejected login with a 200 page that redisplays
//! the form, so the status code alone proves nothing. A login only counts
//! when the response carries one of the configured post-login markers
//! (a logout link, by default).

use archery_scores_models::{Credentials, LoginMarkers, SiteConfig};

use crate::ScrapeError;
use crate::form::{FormFields, extract_fields};
use crate::session::{PageResponse, SessionClient};

/// Outcome of classifying a login response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A post-login marker was found.
    Success,
    /// No marker; carries the human-readable reason.
    Rejected(String),
}

/// Logs `session` in. On success the session's cookie jar holds the
/// authentication cookie for every later request.
///
/// # Errors
///
/// * [`ScrapeError::Authentication`] when `credentials` is missing or blank.
/// * [`ScrapeError::Connection`] on transport failure or a non-2xx status.
/// * [`ScrapeError::LoginFailed`] when the response is not recognised as
///   a logged-in page.
pub async fn login(
    session: &SessionClient,
    config: &SiteConfig,
    credentials: Option<&Credentials>,
) -> Result<PageResponse, ScrapeError> {
    let credentials = credentials
        .filter(|c| c.is_complete())
        .ok_or_else(|| ScrapeError::Authentication("no username/password supplied".to_owned()))?;

    let login_url = config.login_url();
    log::info!("Logging in as {} at {login_url}", credentials.username());

    let page = session.get(&login_url).await?;
    let mut fields = extract_fields(&page.body);
    if fields.is_empty() {
        log::warn!("Login page at {} has no form fields", page.url);
    }

    fill_credentials(&mut fields, config, credentials);

    // The form posts back to the URL it was served from, after redirects.
    let url = page.url;
    let response = session.post_form(&url, &fields).await?;

    match classify(&response.body, &config.login) {
        LoginOutcome::Success => {
            log::info!("Login succeeded");
            Ok(response)
        }
        LoginOutcome::Rejected(reason) => Err(ScrapeError::LoginFailed {
            url,
            status: response.status,
            reason,
        }),
    }
}

/// Writes the credentials into the configured controls.
///
/// When a configured control name is not on the page, the first field whose
/// name mentions `user`/`email` (resp. `password`) is used instead.
pub fn fill_credentials(fields: &mut FormFields, config: &SiteConfig, credentials: &Credentials) {
    let controls = &config.controls;

    let user_field = resolve_field(fields, &controls.username_field, &["user", "email"]);
    let pass_field = resolve_field(fields, &controls.password_field, &["password"]);

    fields.set(user_field, credentials.username());
    fields.set(pass_field, credentials.password());
}

fn resolve_field(fields: &FormFields, configured: &str, hints: &[&str]) -> String {
    if fields.contains(configured) {
        return configured.to_owned();
    }
    hints
        .iter()
        .find_map(|hint| fields.find_name_containing(hint))
        .map_or_else(
            || {
                log::warn!("Login control {configured} not found on page; posting it anyway");
                configured.to_owned()
            },
            |name| {
                log::debug!("Login control {configured} not found; using {name}");
                name.to_owned()
            },
        )
}

/// Classifies a login response body.
#[must_use]
pub fn classify(body: &str, markers: &LoginMarkers) -> LoginOutcome {
    let lower = body.to_lowercase();

    if markers
        .success_markers
        .iter()
        .any(|m| lower.contains(&m.to_lowercase()))
    {
        return LoginOutcome::Success;
    }

    let keyword = markers
        .failure_keywords
        .iter()
        .find(|k| lower.contains(&k.to_lowercase()));

    LoginOutcome::Rejected(keyword.map_or_else(
        || "no post-login marker found in response".to_owned(),
        |k| format!("server response mentions \"{k}\" and has no post-login marker"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{TestResponse, TestServer};

    const LOGIN_FORM: &str = r#"<html><body><form method="post" action="./Login.aspx">
        <input type="hidden" name="__VIEWSTATE" value="vs-login" />
        <input type="hidden" name="__EVENTVALIDATION" value="ev-login" />
        <input name="ctl00$ContentPlaceHolder1$txtUserName" type="text" />
        <input name="ctl00$ContentPlaceHolder1$txtPassword" type="password" />
        <input type="submit" name="ctl00$ContentPlaceHolder1$btnLogin" value="Log In" />
    </form></body></html>"#;

    fn config_for(server: &TestServer) -> SiteConfig {
        SiteConfig {
            base_url: server.base_url().to_owned(),
            ..SiteConfig::default()
        }
    }

    #[test]
    fn classify_requires_marker() {
        let markers = LoginMarkers::default();
        assert_eq!(
            classify("<a href='/Logout.aspx'>Log Out</a>", &markers),
            LoginOutcome::Success
        );
        assert!(matches!(
            classify("<p>Welcome! Please log in.</p>", &markers),
            LoginOutcome::Rejected(_)
        ));
    }

    #[test]
    fn classify_reports_failure_keyword() {
        let LoginOutcome::Rejected(reason) =
            classify("<span>Invalid username or password.</span>", &LoginMarkers::default())
        else {
            panic!("expected rejection");
        };
        assert!(reason.contains("invalid"));
    }

    #[test]
    fn fill_credentials_falls_back_to_name_hints() {
        let mut fields = extract_fields(
            r#"<input name="ctl00$Main$txtEmail"><input name="ctl00$Main$txtPassword" type="password">"#,
        );
        fill_credentials(
            &mut fields,
            &SiteConfig::default(),
            &Credentials::new("coach@example.org", "pw"),
        );
        assert_eq!(fields.get("ctl00$Main$txtEmail"), Some("coach@example.org"));
        assert_eq!(fields.get("ctl00$Main$txtPassword"), Some("pw"));
    }

    #[tokio::test]
    async fn missing_credentials_are_an_authentication_error() {
        let session = SessionClient::new(&SiteConfig::default()).unwrap();
        let err = login(&session, &SiteConfig::default(), None).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Authentication(_)));

        let blank = Credentials::new(" ", "pw");
        let err = login(&session, &SiteConfig::default(), Some(&blank))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Authentication(_)));
    }

    #[tokio::test]
    async fn login_posts_tokens_and_credentials_back() {
        let server = TestServer::spawn(|req| {
            if req.method == "GET" {
                TestResponse::html(LOGIN_FORM)
            } else {
                TestResponse::html("<a id='lnkLogout'>Logout</a>")
                    .with_header("Set-Cookie", ".ASPXAUTH=token; Path=/")
            }
        })
        .await;
        let config = config_for(&server);
        let session = SessionClient::new(&config).unwrap();

        login(&session, &config, Some(&Credentials::new("coach", "s3cret")))
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].path, "/Account/Login.aspx");
        let form = requests[1].form();
        assert_eq!(form["__VIEWSTATE"], "vs-login");
        assert_eq!(form["__EVENTVALIDATION"], "ev-login");
        assert_eq!(form["ctl00$ContentPlaceHolder1$txtUserName"], "coach");
        assert_eq!(form["ctl00$ContentPlaceHolder1$txtPassword"], "s3cret");
        assert_eq!(form["ctl00$ContentPlaceHolder1$btnLogin"], "Log In");
    }

    #[tokio::test]
    async fn redisplayed_login_form_is_login_failure() {
        let server = TestServer::spawn(|req| {
            if req.method == "GET" {
                TestResponse::html(LOGIN_FORM)
            } else {
                TestResponse::html(&format!(
                    "{LOGIN_FORM}<span class='error'>Login failed.</span>"
                ))
            }
        })
        .await;
        let config = config_for(&server);
        let session = SessionClient::new(&config).unwrap();

        let err = login(&session, &config, Some(&Credentials::new("coach", "wrong")))
            .await
            .unwrap_err();
        match err {
            ScrapeError::LoginFailed { status, reason, url } => {
                assert_eq!(status, 200);
                assert!(reason.contains("failed"));
                assert!(url.ends_with("/Account/Login.aspx"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn login_posts_to_the_redirected_form_url() {
        let server = TestServer::spawn(|req| match (req.method.as_str(), req.query.as_str()) {
            ("GET", "") => TestResponse::new(302, "text/html", "")
                .with_header("Location", "/Account/Login.aspx?ReturnUrl=%2f"),
            ("GET", _) => TestResponse::html(LOGIN_FORM),
            _ => TestResponse::html("<a id='lnkLogout'>Logout</a>"),
        })
        .await;
        let config = config_for(&server);
        let session = SessionClient::new(&config).unwrap();

        login(&session, &config, Some(&Credentials::new("coach", "s3cret")))
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].method, "POST");
        assert_eq!(requests[2].query, "ReturnUrl=%2f");
        assert_eq!(requests[2].form()["ctl00$ContentPlaceHolder1$txtUserName"], "coach");
    }
}
