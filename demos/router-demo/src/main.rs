use chimera_core::prelude::*;
use chimera_web::prelude::*;
use serde::Serialize;
use std::path::Path;

// ==================== 数据模型 ====================

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u32,
    name: String,
    email: String,
}

fn users() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
        },
        User {
            id: 2,
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
        },
    ]
}

fn find_user(id: u32) -> Option<User> {
    users().into_iter().find(|u| u.id == id)
}

// ==================== 路由 ====================

/// `/api/users` 下的路由
fn users_router(options: RouterOptions) -> RouterResult<Router> {
    let mut router = Router::with_options(options);

    // 预先加载 :id 对应的用户，后续处理器直接从 extensions 取
    router.param("id", |req, _res, id| {
        let outcome = match id.parse::<u32>().ok().and_then(find_user) {
            Some(user) => {
                req.extensions.insert(user);
                Outcome::Continue
            }
            None => Outcome::fail(DispatchError::status(
                StatusCode::NOT_FOUND,
                format!("User {} not found", id),
            )),
        };
        Box::pin(async move { outcome })
    })?;

    router.get(
        "/",
        handler(|_req, res| {
            let outcome = Outcome::from_result(res.json(&users()).map(|_| Outcome::Handled));
            Box::pin(async move { outcome })
        }),
    )?;

    router
        .route("/:id")?
        .get(handler(|req, res| {
            let outcome = match req.extensions.get::<User>() {
                Some(user) => Outcome::from_result(res.json(user).map(|_| Outcome::Handled)),
                None => Outcome::SkipRoute,
            };
            Box::pin(async move { outcome })
        }))?
        .delete(handler(|req, res| {
            let name = req
                .extensions
                .get::<User>()
                .map(|u| u.name.clone())
                .unwrap_or_default();
            res.set_status(StatusCode::FORBIDDEN)
                .send(format!("{} cannot be deleted in the demo", name));
            Box::pin(async { Outcome::Handled })
        }))?;

    Ok(router)
}

/// `/api/orgs/:org/members` 下的路由，依赖 mergeParams 读取父路由的 :org
fn members_router(options: RouterOptions) -> RouterResult<Router> {
    let mut router = Router::with_options(options.merge_params(true));

    router.get(
        "/:member",
        handler(|req, res| {
            let body = serde_json::json!({
                "org": req.param("org"),
                "member": req.param("member"),
                "base_url": req.base_url,
            });
            let outcome = Outcome::from_result(res.json(&body).map(|_| Outcome::Handled));
            Box::pin(async move { outcome })
        }),
    )?;

    Ok(router)
}

fn app(options: RouterOptions) -> RouterResult<Router> {
    let mut app = Router::with_options(options);

    app.middleware_fn(request_id())?;

    app.all(
        "/health",
        handler(|_req, res| {
            res.send("UP");
            Box::pin(async { Outcome::Handled })
        }),
    )?;

    let mut api = Router::with_options(options);
    api.mount("/users", users_router(options)?)?;
    api.mount("/orgs/:org/members", members_router(options)?)?;
    app.mount("/api", api)?;

    Ok(app)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_file = if Path::new("demos/router-demo/application.toml").exists() {
        "demos/router-demo/application.toml"
    } else {
        "application.toml"
    };

    let env = Environment::new().with_source(EnvironmentPropertySource::new("DEMO_"));
    if Path::new(config_file).exists() {
        env.add_property_source(Box::new(TomlPropertySource::from_file(config_file)?));
    }

    LoggingConfig::from_environment(&env).init()?;

    let options = RouterOptions::from_environment(&env);
    let dispatcher = app(options)?.build();
    tracing::info!(
        routers = dispatcher.routers(),
        routes = dispatcher.routes(),
        "Routes registered"
    );

    println!("\n📋 可用的 API 端点：\n");
    println!("  *      /health                         - 健康检查");
    println!("  GET    /api/users                      - 用户列表");
    println!("  GET    /api/users/:id                  - 获取单个用户（param 回调预加载）");
    println!("  DELETE /api/users/:id                  - 删除用户（演示中总是拒绝）");
    println!("  GET    /api/orgs/:org/members/:member  - 合并父路由参数");
    println!("  OPTIONS 任意路径                        - 自动生成 Allow\n");

    ChimeraWebServer::from_environment(&env, dispatcher).run().await?;
    Ok(())
}
