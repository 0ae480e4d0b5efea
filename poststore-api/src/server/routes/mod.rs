use crate::server::ServerRouter;

mod members;
mod posts;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(members::routes())
}
