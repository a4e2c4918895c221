//! Integration tests for the donated objects backend.

use std::sync::Arc;

use axum::{routing::get, Router};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, Environment, LogFormat};
use crate::db::{init_database, GroupField, ObjectFilter, Repository};
use crate::models::ObjectDraft;
use crate::{create_router, with_layers, AppState};

/// Serve `app` on a random local port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    format!("http://{}", addr)
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let config = Config {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            environment: Environment::Development,
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
        };

        let state = AppState {
            repo: repo.clone(),
            config: Arc::new(config),
        };

        let base_url = serve(create_router(state)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            repo,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create an object over HTTP and return the stored record.
    async fn create(&self, body: Value) -> Value {
        let resp = self
            .client
            .post(self.url("/api/objetos"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    /// Insert an object straight through the repository.
    async fn seed(&self, body: Value) {
        let draft: ObjectDraft = serde_json::from_value(body).unwrap();
        self.repo.insert(draft).await.unwrap();
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

fn sample(name: &str, category: &str, city: &str) -> Value {
    json!({
        "nome": name,
        "categoria": category,
        "descricao": "bom estado",
        "estado": "usado",
        "localizacao": { "cidade": city, "bairro": "Centro" },
        "doador": { "nome": "Ana", "telefone": "111", "email": "A@X.com" }
    })
}

#[tokio::test]
async fn test_index_banner() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/").await;
    assert_eq!(status, 200);
    assert_eq!(body["version"], "1.0.0");
    assert_eq!(body["endpoints"]["objetos"], "/api/objetos");
    assert_eq!(
        body["endpoints"]["estatisticas"],
        "/api/objetos/estatisticas"
    );
}

#[tokio::test]
async fn test_create_object() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/objetos"))
        .json(&sample("Sofá", "sofa", "SP"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Objeto criado com sucesso");
    assert_eq!(body["data"]["doador"]["email"], "a@x.com");
    assert_eq!(body["data"]["disponivel"], true);
    assert_eq!(body["data"]["categoria"], "sofa");
    assert_eq!(body["data"]["imagens"], json!([]));
    assert!(body["data"]["_id"].is_string());
    assert!(body["data"]["dataDoacao"].is_string());
    assert!(body["data"].get("dimensoes").is_none());
}

#[tokio::test]
async fn test_create_then_get_returns_same_record() {
    let fixture = TestFixture::new().await;

    let mut input = sample("Geladeira", "geladeira", "Recife");
    input["imagens"] = json!(["https://img.example/1.jpg", " /uploads/2.png "]);
    input["dimensoes"] = json!({ "largura": 70.5, "altura": 180, "unidade": "cm" });
    let created = fixture.create(input).await;

    assert_eq!(created["imagens"][1], "/uploads/2.png");
    assert_eq!(created["dimensoes"]["largura"], 70.5);

    let id = created["_id"].as_str().unwrap();
    let (status, body) = fixture.get_json(&format!("/api/objetos/{}", id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], created);
}

#[tokio::test]
async fn test_create_validation_errors() {
    let fixture = TestFixture::new().await;

    let empty_name = sample("", "sofa", "SP");
    let resp = fixture
        .client
        .post(fixture.url("/api/objetos"))
        .json(&empty_name)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Dados inválidos");
    assert_eq!(body["errors"], json!(["Nome do objeto é obrigatório"]));

    let resp = fixture
        .client
        .post(fixture.url("/api/objetos"))
        .json(&sample("Cadeira", "invalid-value", "SP"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    let message = body["errors"][0].as_str().unwrap();
    assert!(message.contains("categoria"));
    assert!(message.contains("invalid-value"));

    // Nothing was stored
    let (_, list) = fixture.get_json("/api/objetos").await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_create_malformed_body() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/objetos"))
        .header("content-type", "application/json")
        .body("{\"nome\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Requisição inválida");
    assert!(body["error"].is_string());

    let resp = fixture
        .client
        .post(fixture.url("/api/objetos"))
        .json(&json!({ "nome": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    // Only JSON bodies are accepted
    let resp = fixture
        .client
        .post(fixture.url("/api/objetos"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("nome=Sof%C3%A1&categoria=sofa")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Requisição inválida");
}

#[tokio::test]
async fn test_create_rejects_oversized_body() {
    let fixture = TestFixture::new().await;

    let mut body = sample("Sofá", "sofa", "SP");
    body["descricao"] = json!("x".repeat(11 * 1024 * 1024));
    let resp = fixture
        .client
        .post(fixture.url("/api/objetos"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Requisição inválida");
    assert!(body["error"].is_string());

    let (_, list) = fixture.get_json("/api/objetos").await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_get_missing_and_malformed_id() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .get_json(&format!("/api/objetos/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Objeto não encontrado");

    let (status, body) = fixture.get_json("/api/objetos/not-an-id").await;
    assert_eq!(status, 500);
    assert_eq!(body["message"], "Erro ao buscar objeto");
    assert!(body["error"].as_str().unwrap().contains("not-an-id"));
}

#[tokio::test]
async fn test_update_merges_nested_fields() {
    let fixture = TestFixture::new().await;
    let created = fixture.create(sample("Mesa", "mesa", "SP")).await;
    let id = created["_id"].as_str().unwrap();

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/objetos/{}", id)))
        .json(&json!({
            "descricao": "mesa de jantar",
            "localizacao": { "cidade": "Campinas" },
            "_id": "ignored",
            "createdAt": "2000-01-01T00:00:00Z"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Objeto atualizado com sucesso");
    let data = &body["data"];
    assert_eq!(data["_id"], created["_id"]);
    assert_eq!(data["descricao"], "mesa de jantar");
    assert_eq!(data["localizacao"]["cidade"], "Campinas");
    assert_eq!(data["localizacao"]["bairro"], "Centro");
    assert_eq!(data["doador"], created["doador"]);
    assert_eq!(data["createdAt"], created["createdAt"]);

    let (_, fetched) = fixture.get_json(&format!("/api/objetos/{}", id)).await;
    assert_eq!(&fetched["data"], data);
}

#[tokio::test]
async fn test_update_validation_failure_leaves_record_unchanged() {
    let fixture = TestFixture::new().await;
    let created = fixture.create(sample("Cama", "cama", "SP")).await;
    let id = created["_id"].as_str().unwrap();

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/objetos/{}", id)))
        .json(&json!({ "descricao": "x".repeat(501), "estado": "quebrado" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);

    let (_, fetched) = fixture.get_json(&format!("/api/objetos/{}", id)).await;
    assert_eq!(fetched["data"], created);
}

#[tokio::test]
async fn test_update_missing_object() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/objetos/{}", uuid::Uuid::new_v4())))
        .json(&json!({ "nome": "Outro" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_delete_object() {
    let fixture = TestFixture::new().await;
    let created = fixture.create(sample("Armário", "armario", "SP")).await;
    let path = format!("/api/objetos/{}", created["_id"].as_str().unwrap());

    let resp = fixture.client.delete(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Objeto deletado com sucesso");
    assert!(body.get("data").is_none());

    let (status, _) = fixture.get_json(&path).await;
    assert_eq!(status, 404);

    let resp = fixture.client.delete(fixture.url(&path)).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_mark_unavailable_only_flips_availability() {
    let fixture = TestFixture::new().await;
    let created = fixture.create(sample("Fogão", "eletrodomestico", "SP")).await;
    let id = created["_id"].as_str().unwrap();

    let resp = fixture
        .client
        .patch(fixture.url(&format!("/api/objetos/{}/indisponivel", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Objeto marcado como indisponível");

    let mut updated = body["data"].clone();
    assert_eq!(updated["disponivel"], false);
    let mut expected = created.clone();
    for record in [&mut updated, &mut expected] {
        let fields = record.as_object_mut().unwrap();
        fields.remove("disponivel");
        fields.remove("updatedAt");
    }
    assert_eq!(updated, expected);

    // Default listing only shows available objects
    let (_, list) = fixture.get_json("/api/objetos").await;
    assert_eq!(list["count"], 0);
    let (_, list) = fixture.get_json("/api/objetos?disponivel=false").await;
    assert_eq!(list["count"], 1);

    let resp = fixture
        .client
        .patch(fixture.url(&format!(
            "/api/objetos/{}/indisponivel",
            uuid::Uuid::new_v4()
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_update_never_restores_concurrently_cleared_availability() {
    let fixture = TestFixture::new().await;
    let created = fixture.create(sample("Estante", "armario", "SP")).await;
    let id = created["_id"].as_str().unwrap();

    for round in 0..20 {
        fixture.repo.set_availability(id, true).await.unwrap();

        let patch: ObjectDraft =
            serde_json::from_value(json!({ "nome": format!("Estante {}", round) })).unwrap();
        let (updated, cleared) = tokio::join!(
            fixture.repo.update_by_id(id, patch),
            fixture.repo.set_availability(id, false),
        );
        assert!(updated.unwrap().is_some());
        assert!(cleared.unwrap().is_some());

        let stored = fixture.repo.get_by_id(id).await.unwrap().unwrap();
        assert!(!stored.available, "round {} left the object available", round);
        assert_eq!(stored.name, format!("Estante {}", round));
    }
}

#[tokio::test]
async fn test_list_filters() {
    let fixture = TestFixture::new().await;
    fixture.seed(sample("Sofá velho", "sofa", "SP")).await;
    fixture.seed(sample("Cadeira", "cadeira", "Rio de Janeiro")).await;
    let mut new_sofa = sample("Sofá novo", "sofa", "São Paulo");
    new_sofa["estado"] = json!("novo");
    fixture.seed(new_sofa).await;

    let (status, body) = fixture.get_json("/api/objetos?categoria=sofa").await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 2);
    for object in body["data"].as_array().unwrap() {
        assert_eq!(object["categoria"], "sofa");
    }

    let (_, body) = fixture.get_json("/api/objetos?cidade=JANEIRO").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["nome"], "Cadeira");

    let (_, body) = fixture.get_json("/api/objetos?cidade=S%C3%83O").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["localizacao"]["cidade"], "São Paulo");

    let (_, body) = fixture
        .get_json("/api/objetos?categoria=sofa&estado=novo")
        .await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["nome"], "Sofá novo");

    let (_, body) = fixture.get_json("/api/objetos?categoria=").await;
    assert_eq!(body["count"], 3);

    let (_, body) = fixture.get_json("/api/objetos?categoria=piano").await;
    assert_eq!(body["count"], 0);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_list_sorted_by_donation_date_desc() {
    let fixture = TestFixture::new().await;
    for (name, date) in [
        ("antigo", "2024-01-10T12:00:00Z"),
        ("recente", "2025-06-01T08:30:00Z"),
        ("medio", "2024-11-20T00:00:00Z"),
    ] {
        let mut body = sample(name, "mesa", "SP");
        body["dataDoacao"] = json!(date);
        fixture.seed(body).await;
    }

    let (_, body) = fixture.get_json("/api/objetos").await;
    let names: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["nome"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["recente", "medio", "antigo"]);
}

#[tokio::test]
async fn test_list_caps_at_fifty() {
    let fixture = TestFixture::new().await;
    for i in 0..55 {
        fixture
            .seed(sample(&format!("Cadeira {}", i), "cadeira", "SP"))
            .await;
    }

    let (status, body) = fixture.get_json("/api/objetos").await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 50);
    assert_eq!(body["data"].as_array().unwrap().len(), 50);
}

#[tokio::test]
async fn test_list_rejects_malformed_query() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/objetos?disponivel=talvez").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_statistics() {
    let fixture = TestFixture::new().await;
    for i in 0..12 {
        fixture
            .seed(sample("Mesa", "mesa", &format!("Cidade {:02}", i)))
            .await;
    }
    for _ in 0..3 {
        fixture.seed(sample("Sofá", "sofa", "Cidade 05")).await;
    }
    let extra = fixture.create(sample("Cama", "cama", "Cidade 07")).await;
    fixture
        .client
        .patch(fixture.url(&format!(
            "/api/objetos/{}/indisponivel",
            extra["_id"].as_str().unwrap()
        )))
        .send()
        .await
        .unwrap();

    let (status, body) = fixture.get_json("/api/objetos/estatisticas").await;
    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["total"], 16);
    assert_eq!(data["disponiveis"], 15);

    let by_category = data["porCategoria"].as_array().unwrap();
    let sum: i64 = by_category.iter().map(|g| g["count"].as_i64().unwrap()).sum();
    assert_eq!(sum, 16);
    assert_eq!(by_category[0], json!({ "_id": "mesa", "count": 12 }));
    assert_eq!(by_category.len(), 3);

    let by_city = data["porCidade"].as_array().unwrap();
    assert_eq!(by_city.len(), 10);
    assert_eq!(by_city[0], json!({ "_id": "Cidade 05", "count": 4 }));
    assert_eq!(by_city[1], json!({ "_id": "Cidade 07", "count": 2 }));
    let counts: Vec<i64> = by_city.iter().map(|g| g["count"].as_i64().unwrap()).collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_repository_count_and_aggregate() {
    let fixture = TestFixture::new().await;
    assert_eq!(fixture.repo.count(&ObjectFilter::default()).await.unwrap(), 0);
    assert!(fixture
        .repo
        .aggregate_count(GroupField::Category, None)
        .await
        .unwrap()
        .is_empty());

    fixture.seed(sample("A", "cama", "Natal")).await;
    fixture.seed(sample("B", "sofa", "Natal")).await;
    fixture.seed(sample("C", "sofa", "Belém")).await;
    fixture.seed(sample("D", "cama", "Belém")).await;

    let sofas = ObjectFilter {
        category: Some("sofa".to_string()),
        ..ObjectFilter::default()
    };
    assert_eq!(fixture.repo.count(&sofas).await.unwrap(), 2);

    let cities = fixture
        .repo
        .aggregate_count(GroupField::City, Some(1))
        .await
        .unwrap();
    assert_eq!(cities.len(), 1);
    assert_eq!(cities[0].key, "Belém");
    assert_eq!(cities[0].count, 2);

    // Ties are ordered by key
    let categories = fixture
        .repo
        .aggregate_count(GroupField::Category, None)
        .await
        .unwrap();
    let keys: Vec<_> = categories.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["cama", "sofa"]);
}

#[tokio::test]
async fn test_unknown_routes_return_not_found() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/desconhecido").await;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Rota não encontrada");

    let resp = fixture
        .client
        .delete(fixture.url("/api/objetos"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Rota não encontrada");
}

#[tokio::test]
async fn test_cors_headers_and_options() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/objetos"))
        .header("origin", "http://frontend.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let resp = fixture
        .client
        .request(reqwest::Method::OPTIONS, fixture.url("/api/objetos/qualquer"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .request(reqwest::Method::OPTIONS, fixture.url("/api/objetos"))
        .header("origin", "http://frontend.example")
        .header("access-control-request-method", "PATCH")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let methods = resp.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("PATCH"));
}

#[tokio::test]
async fn test_panic_response_keeps_cors_headers() {
    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    let boom = Router::new().route("/boom", get(explode));
    let client = Client::new();

    for (expose_details, detail) in [(true, "handler exploded"), (false, "Algo deu errado")] {
        let base_url = serve(with_layers(boom.clone(), expose_details)).await;

        let resp = client
            .get(format!("{}/boom", base_url))
            .header("origin", "http://frontend.example")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Erro interno do servidor");
        assert_eq!(body["error"], detail);
    }
}
