use super::handlers::{
    auth::{login, session, types},
    health,
};
use utoipa::{
    openapi::{Contact, Info, InfoBuilder, License},
    OpenApi,
};

/// Documented endpoints. Guarded pages are plain redirects and stay out of it.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        login::login,
        session::session,
        session::logout
    ),
    components(schemas(
        health::Health,
        types::LoginRequest,
        types::LoginResponse,
        types::LoginStatus,
        types::SessionResponse
    )),
    tags(
        (name = "gatehouse", description = "Dashboard sign-in service"),
        (name = "auth", description = "Password and OTP sign-in, sessions")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    spec.info = cargo_info();
    spec
}

fn cargo_info() -> Info {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            optional_str(name),
            optional_str(email.trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Gatehouse"));
            assert_eq!(contact.email.as_deref(), Some("team@gatehouse.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, env!("CARGO_PKG_LICENSE"));
        }
    }

    #[test]
    fn openapi_documents_auth_endpoints() {
        let spec = openapi();
        for path in ["/health", "/v1/auth/login", "/v1/auth/session", "/v1/auth/logout"] {
            assert!(spec.paths.paths.contains_key(path), "{path}");
        }
        assert!(!spec.paths.paths.contains_key("/home"));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Team Gatehouse <team@gatehouse.dev>"),
            (Some("Team Gatehouse"), Some("team@gatehouse.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@mail>"), (None, Some("only@mail")));
        assert_eq!(parse_author("  "), (None, None));
    }
}
