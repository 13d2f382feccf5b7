//! API description and example questions

use axum::{response::IntoResponse, Json};
use serde_json::{json, Value};

use super::API_VERSION;

fn category(name: &str, questions: &[&str]) -> Value {
    json!({ "categoria": name, "perguntas": questions })
}

/// API description
#[utoipa::path(
    get,
    path = "/",
    tag = "info",
    responses((status = 200, description = "Endpoints and a usage example"))
)]
pub async fn home() -> impl IntoResponse {
    Json(json!({
        "mensagem": "LeIA API - Assistente Virtual",
        "versao": API_VERSION,
        "endpoints": {
            "POST /pergunta": "Processar pergunta em JSON",
            "GET /exemplos": "Obter exemplos de perguntas",
            "GET /health": "Verificar status da API",
            "GET /config": "Verificar configurações do banco de dados",
            "GET /metrics": "Métricas de uso da API",
            "GET /chat": "Chat web com a LeIA",
            "GET /swagger-ui": "Documentação OpenAPI",
            "GET /": "Esta página"
        },
        "exemplo_uso": {
            "url": "/pergunta",
            "method": "POST",
            "headers": {"Content-Type": "application/json"},
            "body": {"pergunta": "Qual o fornecedor com maior custo em janeiro de 2024?"}
        }
    }))
}

/// Example questions per category
#[utoipa::path(
    get,
    path = "/exemplos",
    tag = "info",
    responses((status = 200, description = "Example questions and input/output formats"))
)]
pub async fn exemplos() -> impl IntoResponse {
    let categories = [
        category(
            "Custos por Fornecedor",
            &[
                "Qual o fornecedor com maior custo em janeiro de 2024?",
                "Quais são os custos do cliente Safra em dezembro de 2023?",
            ],
        ),
        category(
            "Linhas Telefônicas",
            &[
                "Quantas linhas ativas tem o cliente Safra?",
                "Quantas linhas bloqueadas tem o cliente Sonda?",
            ],
        ),
        category(
            "Custos por Usuário",
            &[
                "Qual usuário teve maior custo no mês atual?",
                "Quem foi o usuário com maior custo em agosto de 2024?",
            ],
        ),
        category(
            "Linhas Ociosas",
            &[
                "Quantas linhas ociosas tem o cliente Safra?",
                "Quantas linhas ociosas por operadora tem o Sotreq?",
            ],
        ),
        category(
            "Termos de Linhas",
            &[
                "Quantas linhas no Cliente Safra não possuem termo?",
                "Do total de linhas sem termos no Cliente Safra, me mostre o total por tipo de linha",
            ],
        ),
    ];

    Json(json!({
        "exemplos": categories,
        "formato_entrada": {
            "pergunta": "Sua pergunta aqui",
            "exemplo": {"pergunta": "Qual o fornecedor com maior custo em janeiro de 2024?"}
        },
        "formato_saida": {
            "sucesso": true,
            "pergunta": "Pergunta original",
            "resposta": "Resposta da LeIA",
            "timestamp": "2024-01-01 12:00:00",
            "versao": API_VERSION
        }
    }))
}
