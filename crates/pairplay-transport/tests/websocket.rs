//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and drive it with
//! a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use pairplay_transport::{Connection, Frame, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(url: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&format!("ws://{addr}/game")).await;
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);

        server_conn
            .send_text("hello from server")
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client_ws
            .send(Message::Text("hello from client".to_string().into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, Frame::Data(b"hello from client".to_vec()));

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_accept_captures_path_and_query() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let _client = connect_client(&format!("ws://{addr}/mobile?token=aaa.bbb.ccc")).await;
        let server_conn = server_handle.await.unwrap();

        assert_eq!(server_conn.request().path, "/mobile");
        assert_eq!(server_conn.request().query_param("token"), Some("aaa.bbb.ccc"));
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let mut client_ws = connect_client(&format!("ws://{addr}/game")).await;
        let server_conn = std::sync::Arc::new(server_handle.await.unwrap());

        // Park a reader, then write from another task.
        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;
        server_conn.send_text("broadcast").await.expect("send");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"broadcast");

        client_ws.send(Message::Close(None)).await.unwrap();
        let result = reader.await.unwrap().expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_ping_answered_as_heartbeat() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let mut client_ws = connect_client(&format!("ws://{addr}/game")).await;
        let server_conn = server_handle.await.unwrap();

        server_conn.ping().await.expect("ping should send");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_ping());
        // The pong is queued by the client and written on flush.
        client_ws.flush().await.unwrap();

        let frame = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have a frame");
        assert_eq!(frame, Frame::Heartbeat);
    }

    #[tokio::test]
    async fn test_websocket_client_ping_is_heartbeat() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let mut client_ws = connect_client(&format!("ws://{addr}/game")).await;
        let server_conn = server_handle.await.unwrap();

        client_ws
            .send(Message::Ping(b"hi".to_vec().into()))
            .await
            .unwrap();
        let frame = server_conn.recv().await.unwrap().unwrap();

        assert_eq!(frame, Frame::Heartbeat);
    }
}
