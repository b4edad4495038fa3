// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of backend payloads into domain types.
//!
//! The backend is inconsistent about field names (`texto` vs `mensaje`,
//! `es_agente` vs `esAgente`) and attachment shapes, so every raw struct
//! accepts all known spellings and missing values fall back to defaults.

use chrono::{DateTime, NaiveDateTime, Utc};
use deskline_core::{
    Attachment, ChatMessage, ConversationId, ConversationSummary, MessageId, Notification,
    NotificationId, Role, TicketId,
};
use deskline_realtime::ChatBroadcast;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Parse a backend timestamp, falling back to `now`.
///
/// Accepts RFC 3339 and naive ISO 8601 (read as UTC).
pub fn parse_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return now;
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc();
    }
    debug!(timestamp = raw, "unparseable timestamp, using now");
    now
}

/// Origin of the backend (scheme, host, port) derived from the API base URL.
///
/// Everything from the first `/api` segment on is dropped.
pub fn backend_origin(api_base: &str) -> String {
    let lower = api_base.to_ascii_lowercase();
    let cut = lower.find("/api").unwrap_or(api_base.len());
    api_base[..cut].trim_end_matches('/').to_string()
}

#[derive(Debug, Deserialize)]
pub struct RawChatMessage {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub conversacion: Option<u64>,
    #[serde(default, rename = "conversacionId")]
    pub conversacion_id: Option<u64>,
    #[serde(default)]
    pub remitente: Option<String>,
    #[serde(default)]
    pub es_agente: Option<bool>,
    #[serde(default, rename = "esAgente")]
    pub es_agente_camel: Option<bool>,
    #[serde(default)]
    pub texto: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub fecha: Option<String>,
}

impl RawChatMessage {
    /// `fallback_thread` is used when the payload names no conversation.
    pub fn normalize(self, fallback_thread: u64, now: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: self.id.map(MessageId),
            thread_id: self
                .conversacion
                .or(self.conversacion_id)
                .unwrap_or(fallback_thread),
            sender: self.remitente.unwrap_or_default(),
            sender_full_name: None,
            is_agent: self.es_agente.or(self.es_agente_camel).unwrap_or(false),
            text: self.texto.or(self.mensaje).unwrap_or_default(),
            timestamp: parse_timestamp(self.fecha.as_deref(), now),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawTicketMessage {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub ticket: Option<u64>,
    #[serde(default)]
    pub usuario: Option<String>,
    #[serde(default, rename = "usuarioFullName")]
    pub usuario_full_name: Option<String>,
    #[serde(default)]
    pub texto: Option<String>,
    #[serde(default)]
    pub es_agente: Option<bool>,
    #[serde(default, rename = "esAgente")]
    pub es_agente_camel: Option<bool>,
    #[serde(default)]
    pub fecha: Option<String>,
    #[serde(default, alias = "archivos", alias = "files")]
    pub attachments: Vec<Value>,
}

impl RawTicketMessage {
    pub fn normalize(self, fallback_ticket: u64, origin: &str, now: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: self.id.map(MessageId),
            thread_id: self.ticket.unwrap_or(fallback_ticket),
            sender: self.usuario.unwrap_or_default(),
            sender_full_name: self.usuario_full_name.filter(|s| !s.is_empty()),
            is_agent: self.es_agente.or(self.es_agente_camel).unwrap_or(false),
            text: self.texto.unwrap_or_default(),
            timestamp: parse_timestamp(self.fecha.as_deref(), now),
            attachments: self
                .attachments
                .iter()
                .map(|raw| normalize_attachment(raw, origin))
                .collect(),
        }
    }
}

fn first_str<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| raw.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

fn first_u64(raw: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| raw.get(*key).and_then(Value::as_u64))
}

/// Normalize one attachment, making its URL absolute against `origin`.
pub fn normalize_attachment(raw: &Value, origin: &str) -> Attachment {
    let mut url = first_str(raw, &["archivo", "file", "url", "file_url", "archivo_url"])
        .unwrap_or_default()
        .to_string();
    let lower = url.to_ascii_lowercase();
    if !url.is_empty() && !lower.starts_with("http://") && !lower.starts_with("https://") {
        if !url.starts_with('/') {
            url.insert(0, '/');
        }
        url = format!("{}{url}", origin.trim_end_matches('/'));
    }

    let name = first_str(
        raw,
        &["nombre", "nombre_original", "name", "filename", "file_name", "archivo_nombre"],
    )
    .map(str::to_string)
    .or_else(|| {
        url.rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
    .unwrap_or_default();

    Attachment {
        id: first_u64(raw, &["id"]),
        name,
        url,
        content_type: first_str(raw, &["tipo", "mime_type", "content_type", "mime"])
            .map(str::to_string),
        size: first_u64(raw, &["tamano", "size"]),
        uploaded_at: first_str(raw, &["fecha_subida", "uploaded_at", "created_at"])
            .map(str::to_string),
    }
}

/// Turn a realtime chat broadcast into a message for `thread`.
pub fn broadcast_message(broadcast: &ChatBroadcast, thread: u64, now: DateTime<Utc>) -> ChatMessage {
    ChatMessage {
        id: broadcast.id.map(MessageId),
        thread_id: broadcast.conversation_id.unwrap_or(thread),
        sender: broadcast.usuario.clone().unwrap_or_default(),
        sender_full_name: None,
        is_agent: broadcast.es_agente.unwrap_or(false),
        text: broadcast.text().unwrap_or_default().to_string(),
        timestamp: parse_timestamp(broadcast.fecha.as_deref(), now),
        attachments: broadcast
            .attachments
            .iter()
            .map(|raw| normalize_attachment(raw, ""))
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConversation {
    pub id: u64,
    #[serde(default)]
    pub usuario_id: Option<u64>,
    #[serde(default)]
    pub usuario_name: Option<String>,
    #[serde(default)]
    pub usuario_email: Option<String>,
    #[serde(default)]
    pub agente_id: Option<u64>,
    #[serde(default)]
    pub agente_name: Option<String>,
    #[serde(default)]
    pub agent_email: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<u64>,
    #[serde(default)]
    pub ticket_asunto: Option<String>,
    #[serde(default)]
    pub ultimo_mensaje: Option<String>,
    #[serde(default)]
    pub ultima_actividad: Option<String>,
    #[serde(default)]
    pub no_leidos: Option<u32>,
}

impl RawConversation {
    pub fn normalize(self) -> ConversationSummary {
        let nonempty = |s: Option<String>| s.filter(|s| !s.is_empty());
        ConversationSummary {
            id: ConversationId(self.id),
            user_id: self.usuario_id,
            user_name: nonempty(self.usuario_name),
            user_email: nonempty(self.usuario_email),
            agent_id: self.agente_id,
            agent_name: nonempty(self.agente_name),
            agent_email: nonempty(self.agent_email),
            ticket_id: self.ticket_id.map(TicketId),
            ticket_subject: nonempty(self.ticket_asunto),
            last_message: nonempty(self.ultimo_mensaje),
            last_activity: self
                .ultima_actividad
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|ts| ts.with_timezone(&Utc)),
            unread: self.no_leidos.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawNotification {
    pub id: u64,
    #[serde(default, rename = "recipientId")]
    pub recipient_id: Option<u64>,
    #[serde(default, rename = "targetRole")]
    pub target_role: Option<String>,
    #[serde(default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub titulo: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub icono: Option<String>,
    #[serde(default)]
    pub leida: Option<bool>,
    #[serde(default)]
    pub ticket_id: Option<u64>,
    #[serde(default)]
    pub data_json: Value,
    #[serde(default)]
    pub creada: Option<String>,
}

impl RawNotification {
    pub fn normalize(self, now: DateTime<Utc>) -> Notification {
        // Some deployments store `data_json` as an encoded string.
        let data = match self.data_json {
            Value::String(encoded) => serde_json::from_str(&encoded).unwrap_or(Value::String(encoded)),
            other => other,
        };
        Notification {
            id: NotificationId(self.id),
            recipient_id: self.recipient_id.unwrap_or(0),
            target_role: self.target_role.as_deref().and_then(|r| r.parse::<Role>().ok()),
            kind: self.tipo.unwrap_or_default(),
            title: self.titulo.unwrap_or_default(),
            message: self.mensaje.unwrap_or_default(),
            icon: self
                .icono
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "fa-bell".to_string()),
            ticket_id: self.ticket_id.map(TicketId),
            read: self.leida.unwrap_or(false),
            created_at: parse_timestamp(self.creada.as_deref(), now),
            data,
        }
    }
}

/// Decode a JSON array element by element, dropping malformed entries.
pub fn decode_list<T: for<'de> Deserialize<'de>>(value: Value, what: &str) -> Vec<T> {
    let Value::Array(items) = value else {
        debug!(what, "expected a JSON array, got something else");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(what, error = %e, "dropping malformed entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_000, 0).unwrap()
    }

    #[test]
    fn timestamps_parse_or_fall_back() {
        assert_eq!(
            parse_timestamp(Some("2026-01-02T03:04:05+02:00"), now()).to_rfc3339(),
            "2026-01-02T01:04:05+00:00"
        );
        assert_eq!(
            parse_timestamp(Some("2026-01-02T03:04:05.123456"), now()).timestamp(),
            DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().timestamp()
        );
        assert_eq!(parse_timestamp(None, now()), now());
        assert_eq!(parse_timestamp(Some("yesterday"), now()), now());
    }

    #[test]
    fn origin_strips_api_suffix() {
        assert_eq!(backend_origin("http://127.0.0.1:8000/api/cuentas"), "http://127.0.0.1:8000");
        assert_eq!(backend_origin("https://h.example.com/API/v2/"), "https://h.example.com");
        assert_eq!(backend_origin("https://h.example.com/"), "https://h.example.com");
    }

    #[test]
    fn chat_message_snake_case() {
        let raw: RawChatMessage = serde_json::from_value(json!({
            "id": 4, "conversacion": 9, "remitente": "ana", "texto": "hola",
            "es_agente": true, "fecha": "2026-01-02T03:04:05Z"
        }))
        .unwrap();
        let msg = raw.normalize(0, now());
        assert_eq!(msg.id, Some(MessageId(4)));
        assert_eq!(msg.thread_id, 9);
        assert!(msg.is_agent);
        assert_eq!(msg.text, "hola");
    }

    #[test]
    fn chat_message_defaults() {
        let raw: RawChatMessage = serde_json::from_value(json!({"mensaje": "x"})).unwrap();
        let msg = raw.normalize(3, now());
        assert_eq!(msg.thread_id, 3);
        assert_eq!(msg.sender, "");
        assert_eq!(msg.timestamp, now());
        assert_eq!(msg.text, "x");
    }

    #[test]
    fn attachment_url_made_absolute() {
        let a = normalize_attachment(
            &json!({"id": 2, "nombre_original": "log.txt", "url": "media/log.txt", "mime_type": "text/plain", "tamano": 10}),
            "http://127.0.0.1:8000",
        );
        assert_eq!(a.url, "http://127.0.0.1:8000/media/log.txt");
        assert_eq!(a.name, "log.txt");
        assert_eq!(a.content_type.as_deref(), Some("text/plain"));
        assert_eq!(a.size, Some(10));

        let b = normalize_attachment(&json!({"archivo": "https://cdn/x/report.pdf"}), "http://h");
        assert_eq!(b.url, "https://cdn/x/report.pdf");
        assert_eq!(b.name, "report.pdf");
    }

    #[test]
    fn ticket_message_with_attachments() {
        let raw: RawTicketMessage = serde_json::from_value(json!({
            "id": 1, "ticket": 5, "usuario": "ana", "usuarioFullName": "Ana P",
            "texto": "adjunto", "es_agente": false, "fecha": "2026-01-02T03:04:05Z",
            "archivos": [{"name": "a.png", "file": "/media/a.png"}]
        }))
        .unwrap();
        let msg = raw.normalize(0, "http://h:8000", now());
        assert_eq!(msg.thread_id, 5);
        assert_eq!(msg.sender_full_name.as_deref(), Some("Ana P"));
        assert_eq!(msg.attachments[0].url, "http://h:8000/media/a.png");
    }

    #[test]
    fn conversation_fields() {
        let raw: RawConversation = serde_json::from_value(json!({
            "id": 3, "usuarioId": 7, "agenteId": 2, "agenteName": "", "ticketId": null,
            "ultimoMensaje": "hola", "ultimaActividad": "2026-01-02T03:04:05Z"
        }))
        .unwrap();
        let conv = raw.normalize();
        assert_eq!(conv.id, ConversationId(3));
        assert_eq!(conv.agent_name, None);
        assert_eq!(conv.last_message.as_deref(), Some("hola"));
        assert!(conv.last_activity.is_some());
        assert_eq!(conv.unread, 0);
    }

    #[test]
    fn notification_defaults_and_data() {
        let raw: RawNotification = serde_json::from_value(json!({
            "id": 11, "recipientId": 7, "tipo": "ticket_response", "titulo": "t",
            "mensaje": "m", "icono": "", "leida": false, "ticket_id": 4,
            "data_json": "{\"ticketId\": 4}", "creada": "2026-01-02T03:04:05Z"
        }))
        .unwrap();
        let n = raw.normalize(now());
        assert_eq!(n.icon, "fa-bell");
        assert_eq!(n.data["ticketId"], 4);
        assert_eq!(n.ticket_id, Some(TicketId(4)));
    }

    #[test]
    fn malformed_list_entries_dropped() {
        let items: Vec<RawConversation> =
            decode_list(json!([{"id": 1}, {"nope": true}, {"id": 2}]), "conversations");
        assert_eq!(items.len(), 2);
        assert!(decode_list::<RawConversation>(json!({"id": 1}), "conversations").is_empty());
    }
}
