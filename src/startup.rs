use std::net::TcpListener;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::{
    routes::{default_route, scrape_route},
    services::Pipeline,
};

pub fn run(listener: TcpListener, pipeline: Pipeline) -> Result<Server, std::io::Error> {
    let pipeline = web::Data::new(pipeline);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::default)
            .service(scrape_route::scrape)
            .app_data(pipeline.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
