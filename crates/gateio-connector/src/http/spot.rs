/*
[INPUT]:  Spot endpoint parameters and signed client
[OUTPUT]: Normalized, typed spot results (time, accounts, orders)
[POS]:    HTTP layer - spot endpoints (public time + signed account/order calls)
[UPDATE]: When adding new spot endpoints or changing query parameters
*/

use reqwest::Method;
use tracing::{info, warn};

use crate::http::normalizer::NormalizedResult;
use crate::http::signature::encode_query;
use crate::http::{GateioClient, Result};
use crate::types::{NewOrderRequest, Order, ServerTime, SpotAccount};

impl GateioClient {
    /// Query server time
    ///
    /// GET /spot/time
    pub async fn server_time(&self) -> Result<NormalizedResult<ServerTime>> {
        let result = self.execute_public(Method::GET, "/spot/time", "").await?;
        Ok(result.decode())
    }

    /// Align the signing clock with the venue and return the offset in milliseconds
    pub async fn sync_time(&self) -> Result<i64> {
        let server_time = self.server_time().await?.into_result()?;
        let offset = self.clock().observe_server_time(server_time.server_time);

        let window_ms = self.config().replay_window.as_millis() as i64;
        if offset.abs() > window_ms {
            warn!(
                offset_ms = offset,
                replay_window_ms = window_ms,
                "local clock outside replay window, signing with server offset"
            );
        } else {
            info!(offset_ms = offset, "clock synchronized");
        }
        Ok(offset)
    }

    /// List spot balances
    ///
    /// GET /spot/accounts?currency={currency}
    pub async fn list_spot_accounts(
        &self,
        currency: Option<&str>,
    ) -> Result<NormalizedResult<Vec<SpotAccount>>> {
        let query = match currency {
            Some(currency) => encode_query(&[("currency", currency)]),
            None => String::new(),
        };
        let result = self
            .execute_signed(Method::GET, "/spot/accounts", &query, None)
            .await?;
        Ok(result.decode())
    }

    /// Place an order
    ///
    /// POST /spot/orders
    pub async fn create_order(&self, req: &NewOrderRequest) -> Result<NormalizedResult<Order>> {
        let body = serde_json::to_vec(req)?;
        let result = self
            .execute_signed(Method::POST, "/spot/orders", "", Some(body))
            .await?;
        Ok(result.decode())
    }

    /// Fetch a single order
    ///
    /// GET /spot/orders/{order_id}?currency_pair={currency_pair}
    pub async fn get_order(
        &self,
        order_id: &str,
        currency_pair: &str,
    ) -> Result<NormalizedResult<Order>> {
        let endpoint = format!("/spot/orders/{order_id}");
        let query = encode_query(&[("currency_pair", currency_pair)]);
        let result = self
            .execute_signed(Method::GET, &endpoint, &query, None)
            .await?;
        Ok(result.decode())
    }

    /// Cancel a single order
    ///
    /// DELETE /spot/orders/{order_id}?currency_pair={currency_pair}
    pub async fn cancel_order(
        &self,
        order_id: &str,
        currency_pair: &str,
    ) -> Result<NormalizedResult<Order>> {
        let endpoint = format!("/spot/orders/{order_id}");
        let query = encode_query(&[("currency_pair", currency_pair)]);
        let result = self
            .execute_signed(Method::DELETE, &endpoint, &query, None)
            .await?;
        Ok(result.decode())
    }
}
