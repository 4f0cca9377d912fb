use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use tera::{Context, Tera};

use crate::domain::error::DomainError;

const TEMPLATES: [(&str, &str); 6] = [
    ("layout.html", include_str!("../../templates/layout.html")),
    ("posts/form.html", include_str!("../../templates/posts/form.html")),
    ("posts/index.html", include_str!("../../templates/posts/index.html")),
    ("posts/create.html", include_str!("../../templates/posts/create.html")),
    ("posts/edit.html", include_str!("../../templates/posts/edit.html")),
    ("posts/show.html", include_str!("../../templates/posts/show.html")),
];

/// Compiled page templates, shared by all workers.
#[derive(Clone)]
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<HttpResponse, DomainError> {
        self.render_with_status(StatusCode::OK, template, context)
    }

    pub fn render_with_status(
        &self,
        status: StatusCode,
        template: &str,
        context: &Context,
    ) -> Result<HttpResponse, DomainError> {
        let body = self.tera.render(template, context).map_err(|e| {
            tracing::error!(template, error = ?e, "template rendering failed");
            DomainError::Internal(format!("render {}: {}", template, e))
        })?;
        Ok(HttpResponse::build(status)
            .insert_header(ContentType::html())
            .body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::dto::{PostFormValues, form_errors};

    #[test]
    fn bundled_templates_compile() {
        Views::new().unwrap();
    }

    #[test]
    fn form_escapes_user_input() {
        let views = Views::new().unwrap();
        let mut context = Context::new();
        context.insert(
            "form",
            &PostFormValues {
                title: "<b>bold</b>".into(),
                content: "plain content".into(),
            },
        );
        context.insert("errors", &form_errors(None));

        let html = views.tera.render("posts/create.html", &context).unwrap();
        assert!(html.contains("&lt;b&gt;bold&lt;&#x2F;b&gt;"));
    }
}
