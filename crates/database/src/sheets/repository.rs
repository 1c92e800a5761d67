use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use services::operations::ports::{
    NewOperation, OperationLogEntry, OperationLogRepository, OperationType,
};
use services::subscription::dates::{format_stored, parse_stored, parse_stored_opt};
use services::subscription::ports::{
    BurnedToken, ClientRecord, ClientRepository, NewBurnRecord, NewClientRecord, PaymentStatus,
    SubscriptionError, SubscriptionStats,
};
use services::ClientId;
use tokio::sync::Mutex;

use super::client::{CellUpdate, SheetsClient};
use super::table::{cell_range, RowRef, Table, BURNED_HEADERS, CLIENT_HEADERS, OPERATION_HEADERS};

/// Record store kept in three worksheets of one spreadsheet.
///
/// The sheet has no transactions; ids are allocated as max id + 1 under a
/// process-local lock, so a single writer process is assumed.
pub struct SheetsRepository {
    client: SheetsClient,
    clients_sheet: String,
    burned_sheet: String,
    operations_sheet: String,
    append_lock: Mutex<()>,
}

impl SheetsRepository {
    pub fn new(client: SheetsClient, config: &config::SheetsConfig) -> Self {
        Self {
            client,
            clients_sheet: config.clients_sheet.clone(),
            burned_sheet: config.burned_sheet.clone(),
            operations_sheet: config.operations_sheet.clone(),
            append_lock: Mutex::new(()),
        }
    }

    /// Create missing worksheets and write header rows into empty ones
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        let titles = self.client.sheet_titles().await?;
        let layouts: [(&str, &[&str]); 3] = [
            (self.clients_sheet.as_str(), &CLIENT_HEADERS[..]),
            (self.burned_sheet.as_str(), &BURNED_HEADERS[..]),
            (self.operations_sheet.as_str(), &OPERATION_HEADERS[..]),
        ];

        for (sheet, headers) in layouts {
            if !titles.iter().any(|t| t == sheet) {
                self.client.add_sheet(sheet).await?;
            }
            if self.client.get_values(sheet).await?.is_empty() {
                tracing::info!("Writing header row into worksheet '{}'", sheet);
                self.client
                    .append_row(sheet, headers.iter().map(|h| h.to_string()).collect())
                    .await?;
            }
        }
        Ok(())
    }

    async fn table(&self, sheet: &str) -> Result<Table, SubscriptionError> {
        let values = self
            .client
            .get_values(sheet)
            .await
            .map_err(SubscriptionError::store)?;
        Ok(Table::from_values(sheet, values))
    }

    /// Decode every client row, skipping malformed ones
    async fn clients(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        let table = self.table(&self.clients_sheet).await?;
        let columns = ClientColumns::locate(&table)?;
        Ok(table
            .rows()
            .filter_map(|row| match columns.decode(&row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(
                        "Sheets: Skipping client row {} in listing: {}",
                        row.number,
                        e
                    );
                    None
                }
            })
            .collect())
    }

    /// Write cells of the client row holding `token`
    async fn update_client(
        &self,
        token: &str,
        cells: &[(&str, String)],
    ) -> Result<(), SubscriptionError> {
        let table = self.table(&self.clients_sheet).await?;
        let row_number = table
            .find("token", token)?
            .map(|row| row.number)
            .ok_or_else(|| SubscriptionError::NotFound(token.to_string()))?;

        let mut updates = Vec::with_capacity(cells.len());
        for (header, value) in cells {
            updates.push(CellUpdate {
                range: cell_range(&self.clients_sheet, table.column(header)?, row_number),
                value: value.clone(),
            });
        }

        self.client
            .update_cells(&updates)
            .await
            .map_err(SubscriptionError::store)
    }
}

struct ClientColumns {
    id: usize,
    token: usize,
    name: usize,
    email: usize,
    profile: usize,
    start: usize,
    end: usize,
    status: usize,
    payment_amount: usize,
    is_burned: usize,
    burn_reason: usize,
    burn_date: usize,
}

impl ClientColumns {
    fn locate(table: &Table) -> Result<Self, SubscriptionError> {
        Ok(Self {
            id: table.column("id")?,
            token: table.column("token")?,
            name: table.column("name")?,
            email: table.column("email")?,
            profile: table.column("profile")?,
            start: table.column("start_date")?,
            end: table.column("end_date")?,
            status: table.column("status")?,
            payment_amount: table.column("payment_amount")?,
            is_burned: table.column("is_burned")?,
            burn_reason: table.column("burn_reason")?,
            burn_date: table.column("burn_date")?,
        })
    }

    fn decode(&self, row: &RowRef<'_>) -> Result<ClientRecord, SubscriptionError> {
        let id = parse_id(row.cell(self.id), row.number)?;
        let amount = row.cell(self.payment_amount);
        let status_cell = row.cell(self.status);
        let status = PaymentStatus::parse(status_cell).unwrap_or_else(|| {
            tracing::warn!(
                "Sheets: Row {} has unknown status '{}', reading it as Unpaid",
                row.number,
                status_cell
            );
            PaymentStatus::default()
        });

        Ok(ClientRecord {
            id: ClientId(id),
            token: row.cell(self.token).to_string(),
            name: row.cell(self.name).to_string(),
            email: row.cell(self.email).to_string(),
            profile: row.cell(self.profile).to_string(),
            start: parse_stored(row.cell(self.start))?,
            end: parse_stored(row.cell(self.end))?,
            status,
            payment_amount: if amount.is_empty() {
                None
            } else {
                Decimal::from_str(amount).ok()
            },
            is_burned: is_truthy(row.cell(self.is_burned)),
            burn_reason: Some(row.cell(self.burn_reason))
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            burn_date: parse_stored_opt(row.cell(self.burn_date))?,
        })
    }
}

fn parse_id(value: &str, row_number: usize) -> Result<i64, SubscriptionError> {
    value.parse().map_err(|_| {
        SubscriptionError::store(format!("row {row_number} has a malformed id '{value}'"))
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[async_trait]
impl ClientRepository for SheetsRepository {
    async fn exists(&self, token: &str) -> Result<bool, SubscriptionError> {
        let table = self.table(&self.clients_sheet).await?;
        Ok(table.find("token", token)?.is_some())
    }

    async fn insert(&self, record: NewClientRecord) -> Result<ClientId, SubscriptionError> {
        let _guard = self.append_lock.lock().await;
        let table = self.table(&self.clients_sheet).await?;
        let id = table.next_id()?;

        tracing::info!(
            "Sheets: Appending client id={} token={}",
            id,
            record.token
        );

        let row = vec![
            id.to_string(),
            record.token,
            record.name,
            record.email,
            record.profile,
            format_stored(record.start),
            format_stored(record.end),
            PaymentStatus::Unpaid.as_str().to_string(),
            "0".to_string(),
            "0".to_string(),
            String::new(),
            String::new(),
        ];
        self.client
            .append_row(&self.clients_sheet, row)
            .await
            .map_err(SubscriptionError::store)?;

        Ok(ClientId(id))
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<ClientRecord>, SubscriptionError> {
        tracing::debug!("Sheets: Fetching client by token={}", token);

        let table = self.table(&self.clients_sheet).await?;
        let columns = ClientColumns::locate(&table)?;
        match table.find("token", token)? {
            Some(row) => columns.decode(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        token: &str,
        status: PaymentStatus,
        amount: Option<Decimal>,
    ) -> Result<(), SubscriptionError> {
        let mut cells = vec![("status", status.as_str().to_string())];
        if let Some(amount) = amount {
            cells.push(("payment_amount", amount.to_string()));
        }
        self.update_client(token, &cells).await
    }

    async fn update_end(
        &self,
        token: &str,
        new_end: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        self.update_client(token, &[("end_date", format_stored(new_end))])
            .await
    }

    async fn mark_burned(
        &self,
        token: &str,
        reason: &str,
        burn_date: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        self.update_client(
            token,
            &[
                ("is_burned", "1".to_string()),
                ("burn_reason", reason.to_string()),
                ("burn_date", format_stored(burn_date)),
            ],
        )
        .await
    }

    async fn insert_burn_record(&self, record: NewBurnRecord) -> Result<(), SubscriptionError> {
        let _guard = self.append_lock.lock().await;
        let table = self.table(&self.burned_sheet).await?;
        let id = table.next_id()?;

        self.client
            .append_row(
                &self.burned_sheet,
                vec![
                    id.to_string(),
                    record.token,
                    record.reason,
                    format_stored(record.burn_date),
                    record.client_id.to_string(),
                ],
            )
            .await
            .map_err(SubscriptionError::store)
    }

    async fn list_all(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        self.clients().await
    }

    async fn list_unpaid(&self) -> Result<Vec<ClientRecord>, SubscriptionError> {
        Ok(self
            .clients()
            .await?
            .into_iter()
            .filter(|c| c.status == PaymentStatus::Unpaid)
            .collect())
    }

    async fn list_burned(&self) -> Result<Vec<BurnedToken>, SubscriptionError> {
        let clients: HashMap<ClientId, ClientRecord> = self
            .clients()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let table = self.table(&self.burned_sheet).await?;
        let (token_col, reason_col, date_col, client_col) = (
            table.column("token")?,
            table.column("burn_reason")?,
            table.column("burn_date")?,
            table.column("client_id")?,
        );

        let mut burned: Vec<BurnedToken> = table
            .rows()
            .filter_map(|row| {
                let burn_date = match parse_stored(row.cell(date_col)) {
                    Ok(date) => date,
                    Err(e) => {
                        tracing::warn!("Sheets: Skipping burn row {}: {}", row.number, e);
                        return None;
                    }
                };
                let token = row.cell(token_col).to_string();
                let owner = row
                    .cell(client_col)
                    .parse::<ClientId>()
                    .ok()
                    .and_then(|id| clients.get(&id))
                    .or_else(|| clients.values().find(|c| c.token == token));

                Some(BurnedToken {
                    reason: row.cell(reason_col).to_string(),
                    burn_date,
                    name: owner.map(|c| c.name.clone()).unwrap_or_default(),
                    email: owner.map(|c| c.email.clone()).unwrap_or_default(),
                    profile: owner.map(|c| c.profile.clone()).unwrap_or_default(),
                    token,
                })
            })
            .collect();

        burned.sort_by(|a, b| b.burn_date.cmp(&a.burn_date));
        Ok(burned)
    }

    async fn list_expiring_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ClientRecord>, SubscriptionError> {
        let mut expiring: Vec<ClientRecord> = self
            .clients()
            .await?
            .into_iter()
            .filter(|c| c.expires_within(now, until))
            .collect();
        expiring.sort_by(|a, b| a.end.cmp(&b.end));
        Ok(expiring)
    }

    async fn search(&self, query: &str) -> Result<Vec<ClientRecord>, SubscriptionError> {
        let needle = query.to_lowercase();
        Ok(self
            .clients()
            .await?
            .into_iter()
            .filter(|c| c.matches(&needle))
            .collect())
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<SubscriptionStats, SubscriptionError> {
        let mut stats = SubscriptionStats::default();
        for client in self.clients().await? {
            stats.count(&client, now);
        }
        Ok(stats)
    }
}

#[async_trait]
impl OperationLogRepository for SheetsRepository {
    async fn append_operation(&self, operation: NewOperation) -> Result<(), SubscriptionError> {
        let _guard = self.append_lock.lock().await;
        let table = self.table(&self.operations_sheet).await?;
        let id = table.next_id()?;

        self.client
            .append_row(
                &self.operations_sheet,
                vec![
                    id.to_string(),
                    format_stored(operation.timestamp),
                    operation.op_type.as_str().to_string(),
                    operation.token,
                    operation.details,
                    operation.amount.to_string(),
                    operation
                        .client_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                ],
            )
            .await
            .map_err(SubscriptionError::store)
    }

    async fn recent_operations(
        &self,
        limit: usize,
    ) -> Result<Vec<OperationLogEntry>, SubscriptionError> {
        let names: HashMap<ClientId, String> = self
            .clients()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let table = self.table(&self.operations_sheet).await?;
        let (id_col, ts_col, type_col, token_col) = (
            table.column("id")?,
            table.column("timestamp")?,
            table.column("operation_type")?,
            table.column("token")?,
        );
        let (details_col, amount_col, client_col) = (
            table.column("details")?,
            table.column("amount")?,
            table.column("client_id")?,
        );

        let mut entries: Vec<OperationLogEntry> = table
            .rows()
            .filter_map(|row| {
                let Ok(id) = row.cell(id_col).parse::<i64>() else {
                    tracing::warn!(
                        "Sheets: Skipping operation row {}: malformed id '{}'",
                        row.number,
                        row.cell(id_col)
                    );
                    return None;
                };
                let Some(op_type) = OperationType::parse(row.cell(type_col)) else {
                    tracing::warn!(
                        "Sheets: Skipping operation row {}: unknown type '{}'",
                        row.number,
                        row.cell(type_col)
                    );
                    return None;
                };
                let timestamp = match parse_stored(row.cell(ts_col)) {
                    Ok(ts) => ts,
                    Err(e) => {
                        tracing::warn!("Sheets: Skipping operation row {}: {}", row.number, e);
                        return None;
                    }
                };
                let client_id = row.cell(client_col).parse::<ClientId>().ok();

                Some(OperationLogEntry {
                    id,
                    op_type,
                    timestamp,
                    token: row.cell(token_col).to_string(),
                    details: row.cell(details_col).to_string(),
                    amount: Decimal::from_str(row.cell(amount_col)).unwrap_or_default(),
                    client_name: client_id.and_then(|id| names.get(&id).cloned()),
                    client_id,
                })
            })
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALUES: &str = "/v4/spreadsheets/sheet-1/values";

    fn sheets_config(server: &MockServer) -> config::SheetsConfig {
        config::SheetsConfig {
            api_base_url: Url::parse(&server.uri()).unwrap(),
            spreadsheet_id: "sheet-1".to_string(),
            service_account_key: None,
            access_token: Some("test-token".to_string()),
            timeout_secs: 5,
            clients_sheet: "clients".to_string(),
            burned_sheet: "burned_tokens".to_string(),
            operations_sheet: "operations_log".to_string(),
        }
    }

    fn repository(server: &MockServer) -> SheetsRepository {
        let config = sheets_config(server);
        SheetsRepository::new(SheetsClient::new(&config).unwrap(), &config)
    }

    fn client_rows() -> serde_json::Value {
        json!({
            "range": "clients!A1:L4",
            "values": [
                CLIENT_HEADERS,
                ["1", "NFX-AAAA-1111-Kids", "John Smith", "john@x.com", "Kids",
                 "2025-01-01 10:00:00", "2025-01-31", "Paid", "15.5", "0"],
                ["2", "NFX-BBBB-2222-Kids", "Broken", "b@x.com", "Kids",
                 "yesterday", "2025-02-01 00:00:00", "Unpaid", "0", "0"],
                ["3", "NFX-CCCC-3333-Kids", "Mary", "mary@x.com", "Kids",
                 "2025-01-01 10:00:00", "2025-02-01 10:00:00", "Unpaid", "0", "1",
                 "fraud", "2025-01-05 09:30:00"]
            ]
        })
    }

    async fn mount_clients(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/clients")))
            .respond_with(ResponseTemplate::new(200).set_body_json(client_rows()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_by_token_decodes_row() {
        let server = MockServer::start().await;
        mount_clients(&server).await;
        let repo = repository(&server);

        let record = repo
            .get_by_token("NFX-AAAA-1111-Kids")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.id, ClientId(1));
        assert_eq!(record.status, PaymentStatus::Paid);
        assert_eq!(record.payment_amount, Some(Decimal::new(155, 1)));
        assert_eq!(record.end, Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap());
        assert!(!record.is_burned);
        assert_eq!(record.burn_date, None);

        let burned = repo
            .get_by_token("NFX-CCCC-3333-Kids")
            .await
            .unwrap()
            .unwrap();
        assert!(burned.is_burned);
        assert_eq!(burned.burn_reason.as_deref(), Some("fraud"));

        assert!(repo.get_by_token("NFX-ZZZZ-9999-Kids").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_date_is_a_fault_on_lookup_but_skipped_in_lists() {
        let server = MockServer::start().await;
        mount_clients(&server).await;
        let repo = repository(&server);

        assert_eq!(
            repo.get_by_token("NFX-BBBB-2222-Kids").await,
            Err(SubscriptionError::DateParseFault {
                value: "yesterday".to_string()
            })
        );

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 2);

        let now = Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap();
        let stats = repo.stats(now).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.burned, 1);
    }

    #[tokio::test]
    async fn test_insert_appends_with_next_id() {
        let server = MockServer::start().await;
        mount_clients(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/clients:append")))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_json(json!({
                "values": [[
                    "4", "NFX-DDDD-4444-Kids", "Ann", "ann@x.com", "Kids",
                    "2025-03-01 12:00:00", "2025-03-31 12:00:00", "Unpaid", "0", "0", "", ""
                ]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let id = repository(&server)
            .insert(NewClientRecord {
                token: "NFX-DDDD-4444-Kids".to_string(),
                name: "Ann".to_string(),
                email: "ann@x.com".to_string(),
                profile: "Kids".to_string(),
                start,
                end: start + chrono::Duration::days(30),
            })
            .await
            .unwrap();
        assert_eq!(id, ClientId(4));
    }

    #[tokio::test]
    async fn test_update_status_writes_cells() {
        let server = MockServer::start().await;
        mount_clients(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}:batchUpdate")))
            .and(body_json(json!({
                "valueInputOption": "RAW",
                "data": [
                    { "range": "'clients'!H4", "values": [["Paid"]] },
                    { "range": "'clients'!I4", "values": [["20"]] }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        repository(&server)
            .update_status("NFX-CCCC-3333-Kids", PaymentStatus::Paid, Some(Decimal::new(20, 0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_unknown_token_is_not_found() {
        let server = MockServer::start().await;
        mount_clients(&server).await;

        let result = repository(&server)
            .update_end("NFX-ZZZZ-9999-Kids", Utc::now())
            .await;
        assert_eq!(
            result,
            Err(SubscriptionError::NotFound("NFX-ZZZZ-9999-Kids".to_string()))
        );
    }

    #[tokio::test]
    async fn test_http_failure_is_store_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;

        assert!(matches!(
            repository(&server).exists("NFX-AAAA-1111-Kids").await,
            Err(SubscriptionError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_recent_operations_join_names_newest_first() {
        let server = MockServer::start().await;
        mount_clients(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/operations_log")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    OPERATION_HEADERS,
                    ["1", "2025-01-01 10:00:00", "NEW", "NFX-AAAA-1111-Kids",
                     "Profile: Kids, Duration: 30", "0", "1"],
                    ["2", "2025-01-02 10:00:00", "PAID", "NFX-AAAA-1111-Kids",
                     "Status changed to Paid", "15.5", "1"],
                    ["3", "garbage", "EXT", "NFX-AAAA-1111-Kids", "+3 days", "0", "1"],
                    ["4", "2025-01-03 10:00:00", "BURN", "NFX-GONE-0000-Kids", "fraud", "0", "99"],
                    ["5", "2025-01-04 10:00:00", "DELETE", "NFX-AAAA-1111-Kids", "", "0", "1"],
                    ["", "2025-01-05 10:00:00", "PAID", "NFX-AAAA-1111-Kids", "", "0", "1"]
                ]
            })))
            .mount(&server)
            .await;
        let repo = repository(&server);

        let recent = repo.recent_operations(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].op_type, OperationType::Burn);
        assert_eq!(recent[0].client_name, None);
        assert_eq!(recent[1].op_type, OperationType::Paid);
        assert_eq!(recent[1].client_name.as_deref(), Some("John Smith"));
        assert_eq!(recent[1].amount, Decimal::new(155, 1));

        // Bad timestamp, unknown type and missing id rows are all dropped
        let ids: Vec<i64> = repo
            .recent_operations(10)
            .await
            .unwrap()
            .iter()
            .map(|op| op.id)
            .collect();
        assert_eq!(ids, vec![4, 2, 1]);
    }

    #[tokio::test]
    async fn test_unknown_status_reads_as_unpaid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/clients")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    CLIENT_HEADERS,
                    ["7", "NFX-GGGG-7777-Kids", "Gus", "gus@x.com", "Kids",
                     "2025-01-01", "2025-02-01", "Pending", "", "0"]
                ]
            })))
            .mount(&server)
            .await;

        let record = repository(&server)
            .get_by_token("NFX-GGGG-7777-Kids")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, PaymentStatus::Unpaid);
        assert_eq!(record.payment_amount, None);
    }

    #[tokio::test]
    async fn test_mark_burned_writes_three_cells() {
        let server = MockServer::start().await;
        mount_clients(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}:batchUpdate")))
            .and(body_json(json!({
                "valueInputOption": "RAW",
                "data": [
                    { "range": "'clients'!J2", "values": [["1"]] },
                    { "range": "'clients'!K2", "values": [["chargeback"]] },
                    { "range": "'clients'!L2", "values": [["2025-01-10 08:15:00"]] }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        repository(&server)
            .mark_burned(
                " NFX-AAAA-1111-Kids",
                "chargeback",
                Utc.with_ymd_and_hms(2025, 1, 10, 8, 15, 0).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insert_burn_record_appends_with_next_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/burned_tokens")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    BURNED_HEADERS,
                    ["1", "NFX-CCCC-3333-Kids", "fraud", "2025-01-05 09:30:00", "3"]
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/burned_tokens:append")))
            .and(body_json(json!({
                "values": [["2", "NFX-AAAA-1111-Kids", "chargeback", "2025-01-10 08:15:00", "1"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        repository(&server)
            .insert_burn_record(NewBurnRecord {
                token: "NFX-AAAA-1111-Kids".to_string(),
                reason: "chargeback".to_string(),
                burn_date: Utc.with_ymd_and_hms(2025, 1, 10, 8, 15, 0).unwrap(),
                client_id: ClientId(1),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_burned_joins_by_id_then_token() {
        let server = MockServer::start().await;
        mount_clients(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/burned_tokens")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    BURNED_HEADERS,
                    ["1", "NFX-AAAA-1111-Kids", "abuse", "2025-01-02 10:00:00", "1"],
                    // Stale client id; the token still identifies Mary
                    ["2", "NFX-CCCC-3333-Kids", "fraud", "2025-01-05 09:30:00", "42"],
                    ["3", "NFX-GONE-0000-Kids", "lost", "2025-01-04 00:00:00", ""],
                    ["4", "NFX-AAAA-1111-Kids", "dup", "not a date", "1"]
                ]
            })))
            .mount(&server)
            .await;

        let burned = repository(&server).list_burned().await.unwrap();
        let summary: Vec<(&str, &str)> = burned
            .iter()
            .map(|b| (b.token.as_str(), b.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("NFX-CCCC-3333-Kids", "Mary"),
                ("NFX-GONE-0000-Kids", ""),
                ("NFX-AAAA-1111-Kids", "John Smith"),
            ]
        );
        assert_eq!(burned[0].email, "mary@x.com");
        assert_eq!(burned[0].reason, "fraud");
    }

    #[tokio::test]
    async fn test_append_operation_writes_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/operations_log")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [
                    OPERATION_HEADERS,
                    ["1", "2025-01-01 10:00:00", "NEW", "NFX-AAAA-1111-Kids", "", "0", "1"]
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/operations_log:append")))
            .and(body_json(json!({
                "values": [[
                    "2", "2025-01-02 10:00:00", "PAID", "NFX-AAAA-1111-Kids",
                    "Status changed to Paid", "15.50", ""
                ]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        repository(&server)
            .append_operation(NewOperation {
                op_type: OperationType::Paid,
                timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap(),
                token: "NFX-AAAA-1111-Kids".to_string(),
                details: "Status changed to Paid".to_string(),
                amount: Decimal::new(1550, 2),
                client_id: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_schema_creates_sheet_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [
                    { "properties": { "title": "clients" } },
                    { "properties": { "title": "burned_tokens" } }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1:batchUpdate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        mount_clients(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/burned_tokens")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": [BURNED_HEADERS] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/operations_log")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "operations_log!A1:Z1000" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/operations_log:append")))
            .and(body_json(json!({ "values": [OPERATION_HEADERS] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        repository(&server).ensure_schema().await.unwrap();
    }
}
