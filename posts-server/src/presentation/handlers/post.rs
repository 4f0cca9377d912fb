use actix_multipart::Multipart;
use actix_web::http::{StatusCode, header};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, delete, get, post, route, web};
use tera::Context;
use tracing::info;

use crate::application::post_service::PostService;
use crate::domain::error::{DomainError, ValidationErrors};
use crate::domain::post::Post;
use crate::presentation::dto::{ListPostsQuery, PageLinks, PostFormValues, form_errors};
use crate::presentation::middleware::RequestId;
use crate::presentation::utils::{Flash, flash_removal, read_post_form, redirect_to_index};
use crate::presentation::views::Views;

const IMAGE_CSP: &str = "default-src 'none'; style-src 'unsafe-inline'; sandbox";

/// Registers the posts resource routes.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home)
        .service(index)
        .service(create)
        .service(store)
        .service(show)
        .service(edit)
        .service(update)
        .service(destroy)
        .service(destroy_from_form)
        .service(image);
}

#[get("/")]
async fn home() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/posts"))
        .finish()
}

#[get("/posts")]
async fn index(
    req: HttpRequest,
    posts: web::Data<PostService>,
    views: web::Data<Views>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse, DomainError> {
    let page = posts.list_posts(query.page).await?;
    let flash = Flash::from_request(&req);

    let links = PageLinks {
        current: page.page,
        last: page.last_page(),
        previous: page.has_previous().then(|| page.page - 1),
        next: page.has_next().then(|| page.page + 1),
    };

    let mut context = Context::new();
    context.insert("page", &page);
    context.insert("links", &links);
    context.insert("flash", &flash.map(Flash::message));

    let mut response = views.render("posts/index.html", &context)?;
    if flash.is_some() {
        response
            .add_removal_cookie(&flash_removal())
            .map_err(|e| DomainError::Internal(e.to_string()))?;
    }
    Ok(response)
}

#[get("/posts/create")]
async fn create(views: web::Data<Views>) -> Result<HttpResponse, DomainError> {
    render_form(&views, StatusCode::OK, None, &PostFormValues::default(), None)
}

#[post("/posts")]
async fn store(
    req: HttpRequest,
    posts: web::Data<PostService>,
    views: web::Data<Views>,
    payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let input = read_post_form(payload).await?;
    let values = PostFormValues::from(&input);

    match posts.create_post(input).await {
        Ok(post) => {
            info!(request_id = %request_id(&req), post_id = post.id, "post stored");
            Ok(redirect_to_index(Flash::Saved))
        }
        Err(DomainError::Validation(errors)) => render_form(
            &views,
            StatusCode::UNPROCESSABLE_ENTITY,
            None,
            &values,
            Some(&errors),
        ),
        Err(e) => Err(e),
    }
}

#[get("/posts/{id:\\d+}")]
async fn show(
    posts: web::Data<PostService>,
    views: web::Data<Views>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;

    let mut context = Context::new();
    context.insert("post", &post);
    views.render("posts/show.html", &context)
}

#[get("/posts/{id:\\d+}/edit")]
async fn edit(
    posts: web::Data<PostService>,
    views: web::Data<Views>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    let values = PostFormValues {
        title: post.title.clone(),
        content: post.content.clone(),
    };
    render_form(&views, StatusCode::OK, Some(&post), &values, None)
}

/// HTML forms cannot send PUT, so POST to the same path updates as well.
#[route("/posts/{id:\\d+}", method = "PUT", method = "POST")]
async fn update(
    req: HttpRequest,
    posts: web::Data<PostService>,
    views: web::Data<Views>,
    path: web::Path<i64>,
    payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let input = read_post_form(payload).await?;
    let values = PostFormValues::from(&input);

    match posts.update_post(post_id, input).await {
        Ok(post) => {
            info!(request_id = %request_id(&req), post_id = post.id, "post updated");
            Ok(redirect_to_index(Flash::Updated))
        }
        Err(DomainError::Validation(errors)) => {
            let post = posts.get_post(post_id).await?;
            render_form(
                &views,
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(&post),
                &values,
                Some(&errors),
            )
        }
        Err(e) => Err(e),
    }
}

#[delete("/posts/{id:\\d+}")]
async fn destroy(
    req: HttpRequest,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    remove_post(&req, &posts, path.into_inner()).await
}

#[post("/posts/{id:\\d+}/delete")]
async fn destroy_from_form(
    req: HttpRequest,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    remove_post(&req, &posts, path.into_inner()).await
}

#[get("/storage/posts/{name}")]
async fn image(
    posts: web::Data<PostService>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let name = path.into_inner();
    if name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Ok(HttpResponse::NotFound().finish());
    }

    match posts.get_image(&name).await? {
        Some(data) => {
            let content_type = mime_guess::from_path(&name).first_or_octet_stream();
            Ok(HttpResponse::Ok()
                .insert_header((header::CONTENT_TYPE, content_type.essence_str()))
                .insert_header((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                // stored SVGs must not run script when opened directly
                .insert_header((header::CONTENT_SECURITY_POLICY, IMAGE_CSP))
                .body(data))
        }
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

async fn remove_post(
    req: &HttpRequest,
    posts: &PostService,
    post_id: i64,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(post_id).await?;
    posts.delete_post(&post).await?;

    info!(request_id = %request_id(req), post_id, "post deleted");
    Ok(redirect_to_index(Flash::Deleted))
}

fn render_form(
    views: &Views,
    status: StatusCode,
    post: Option<&Post>,
    values: &PostFormValues,
    errors: Option<&ValidationErrors>,
) -> Result<HttpResponse, DomainError> {
    let mut context = Context::new();
    context.insert("form", values);
    context.insert("errors", &form_errors(errors));

    let template = match post {
        Some(post) => {
            context.insert("post", post);
            "posts/edit.html"
        }
        None => "posts/create.html",
    };
    views.render_with_status(status, template, &context)
}

fn request_id(req: &HttpRequest) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|rid| rid.0.clone())
        .unwrap_or_else(|| "unknown".into())
}
